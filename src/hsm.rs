//! Hierarchical state machine machinery.
//!
//! The state space is a static tree described by [`StateSet`]; the machine
//! itself (the automaton) holds only the current leaf. Dispatch walks the
//! handler chain from the leaf toward the root; transitions exit to the
//! least common ancestor, enter down to the target, then follow initial
//! chains. No allocation anywhere: ancestor paths live in fixed arrays.

use crate::error::AgentError;
use crate::events::Event;

/// Maximum nesting depth of any state tree.
pub const MAX_DEPTH: usize = 8;

/// A static state tree. Implemented on a fieldless `Copy` enum.
pub trait StateSet: Copy + Eq + std::fmt::Debug + 'static {
    /// Parent state; `None` for the root.
    fn parent(self) -> Option<Self>;
    /// Initial substate entered after this state, if composite.
    fn initial(self) -> Option<Self>;
    fn name(self) -> &'static str;
}

/// What a state handler did with an event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome<S> {
    Handled,
    Transition(S),
    /// Bubble to the parent state's handler.
    Unhandled,
}

/// The machine seam: current-leaf storage plus per-state behavior.
pub trait Automaton {
    type State: StateSet;

    fn state(&self) -> Self::State;
    fn set_state(&mut self, next: Self::State);

    fn handle(
        &mut self,
        state: Self::State,
        event: &Event<'_>,
    ) -> Result<Outcome<Self::State>, AgentError>;

    fn on_entry(&mut self, _state: Self::State) -> Result<(), AgentError> {
        Ok(())
    }

    fn on_exit(&mut self, _state: Self::State) -> Result<(), AgentError> {
        Ok(())
    }

    /// Called once per dispatch whose net effect changed the leaf.
    fn on_leaf_change(&mut self, _from: Self::State, _to: Self::State) {}
}

fn chain<S: StateSet>(from: S) -> ([Option<S>; MAX_DEPTH], usize) {
    let mut out = [None; MAX_DEPTH];
    let mut n = 0;
    let mut cursor = Some(from);
    while let Some(s) = cursor {
        debug_assert!(n < MAX_DEPTH, "state tree deeper than MAX_DEPTH");
        out[n] = Some(s);
        n += 1;
        cursor = s.parent();
    }
    (out, n)
}

/// Enter the machine's starting configuration: enter the current state and
/// follow its initial chain down to a leaf.
pub fn init<A: Automaton>(a: &mut A) -> Result<(), AgentError> {
    let mut leaf = a.state();
    a.on_entry(leaf)?;
    while let Some(next) = leaf.initial() {
        a.on_entry(next)?;
        leaf = next;
        a.set_state(leaf);
    }
    Ok(())
}

/// Route one event. Returns whether any handler claimed it.
pub fn dispatch<A: Automaton>(a: &mut A, event: &Event<'_>) -> Result<bool, AgentError> {
    let before = a.state();
    let mut cursor = Some(before);
    let mut handled = false;

    while let Some(s) = cursor {
        match a.handle(s, event)? {
            Outcome::Handled => {
                handled = true;
                break;
            }
            Outcome::Transition(target) => {
                transition(a, target)?;
                handled = true;
                break;
            }
            Outcome::Unhandled => cursor = s.parent(),
        }
    }

    let after = a.state();
    if after != before {
        a.on_leaf_change(before, after);
    }
    Ok(handled)
}

/// Exit from the current leaf up to the LCA with `target`, enter down to
/// `target`, then follow initial chains to a leaf.
///
/// When the target is the current leaf or one of its ancestors, the LCA is
/// lifted one level so the target exits and re-enters (self-transition).
pub fn transition<A: Automaton>(a: &mut A, target: A::State) -> Result<(), AgentError> {
    let source = a.state();
    let (src, src_len) = chain(source);
    let (dst, dst_len) = chain(target);

    let mut lca: Option<A::State> = None;
    'outer: for i in 0..src_len {
        for j in 0..dst_len {
            if src[i] == dst[j] {
                lca = src[i];
                break 'outer;
            }
        }
    }
    if lca == Some(target) {
        lca = target.parent();
    }

    for item in src.iter().take(src_len) {
        let s = item.unwrap();
        if Some(s) == lca {
            break;
        }
        a.on_exit(s)?;
    }

    let mut entry: [Option<A::State>; MAX_DEPTH] = [None; MAX_DEPTH];
    let mut n = 0;
    for item in dst.iter().take(dst_len) {
        let s = item.unwrap();
        if Some(s) == lca {
            break;
        }
        entry[n] = Some(s);
        n += 1;
    }
    for k in (0..n).rev() {
        a.on_entry(entry[k].unwrap())?;
    }
    a.set_state(target);

    let mut leaf = target;
    while let Some(next) = leaf.initial() {
        a.on_entry(next)?;
        leaf = next;
        a.set_state(leaf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Sym, sym};

    // Root ── A ── A1
    //     │      └ A2
    //     └─ B ── B1 ── B1a
    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Toy {
        Root,
        A,
        A1,
        A2,
        B,
        B1,
        B1a,
    }

    impl StateSet for Toy {
        fn parent(self) -> Option<Self> {
            match self {
                Toy::Root => None,
                Toy::A | Toy::B => Some(Toy::Root),
                Toy::A1 | Toy::A2 => Some(Toy::A),
                Toy::B1 => Some(Toy::B),
                Toy::B1a => Some(Toy::B1),
            }
        }

        fn initial(self) -> Option<Self> {
            match self {
                Toy::Root => Some(Toy::A),
                Toy::A => Some(Toy::A1),
                Toy::B => Some(Toy::B1),
                Toy::B1 => Some(Toy::B1a),
                _ => None,
            }
        }

        fn name(self) -> &'static str {
            match self {
                Toy::Root => "Root",
                Toy::A => "A",
                Toy::A1 => "A1",
                Toy::A2 => "A2",
                Toy::B => "B",
                Toy::B1 => "B1",
                Toy::B1a => "B1a",
            }
        }
    }

    const GO_A2: Sym = Sym(900);
    const GO_B: Sym = Sym(901);
    const SELF_A: Sym = Sym(902);
    const NOTE: Sym = Sym(903);

    struct ToyMachine {
        state: Toy,
        trace: Vec<String>,
        leaf_changes: u32,
    }

    impl ToyMachine {
        fn new() -> Self {
            Self {
                state: Toy::Root,
                trace: Vec::new(),
                leaf_changes: 0,
            }
        }
    }

    impl Automaton for ToyMachine {
        type State = Toy;

        fn state(&self) -> Toy {
            self.state
        }

        fn set_state(&mut self, next: Toy) {
            self.state = next;
        }

        fn handle(&mut self, state: Toy, event: &Event<'_>) -> Result<Outcome<Toy>, AgentError> {
            Ok(match (state, event.tag) {
                (Toy::A1, t) if t == GO_A2 => Outcome::Transition(Toy::A2),
                (Toy::Root, t) if t == GO_B => Outcome::Transition(Toy::B),
                (Toy::A, t) if t == SELF_A => Outcome::Transition(Toy::A),
                (Toy::A, t) if t == NOTE => {
                    self.trace.push("note@A".to_string());
                    Outcome::Handled
                }
                _ => Outcome::Unhandled,
            })
        }

        fn on_entry(&mut self, state: Toy) -> Result<(), AgentError> {
            self.trace.push(format!("+{}", state.name()));
            Ok(())
        }

        fn on_exit(&mut self, state: Toy) -> Result<(), AgentError> {
            self.trace.push(format!("-{}", state.name()));
            Ok(())
        }

        fn on_leaf_change(&mut self, _from: Toy, _to: Toy) {
            self.leaf_changes += 1;
        }
    }

    fn started() -> ToyMachine {
        let mut m = ToyMachine::new();
        init(&mut m).unwrap();
        m.trace.clear();
        m
    }

    #[test]
    fn init_follows_initial_chain() {
        let mut m = ToyMachine::new();
        init(&mut m).unwrap();
        assert_eq!(m.state, Toy::A1);
        assert_eq!(m.trace, vec!["+Root", "+A", "+A1"]);
    }

    #[test]
    fn sibling_transition_exits_to_lca_only() {
        let mut m = started();
        dispatch(&mut m, &Event::named(GO_A2, 0)).unwrap();
        assert_eq!(m.state, Toy::A2);
        // A is the LCA: it neither exits nor re-enters
        assert_eq!(m.trace, vec!["-A1", "+A2"]);
        assert_eq!(m.leaf_changes, 1);
    }

    #[test]
    fn cross_branch_transition_runs_full_paths_in_order() {
        let mut m = started();
        dispatch(&mut m, &Event::named(GO_B, 0)).unwrap();
        assert_eq!(m.state, Toy::B1a);
        assert_eq!(m.trace, vec!["-A1", "-A", "+B", "+B1", "+B1a"]);
    }

    #[test]
    fn self_transition_exits_and_reenters() {
        let mut m = started();
        dispatch(&mut m, &Event::named(SELF_A, 0)).unwrap();
        assert_eq!(m.state, Toy::A1);
        assert_eq!(m.trace, vec!["-A1", "-A", "+A", "+A1"]);
    }

    #[test]
    fn unhandled_event_bubbles_and_reports_false() {
        let mut m = started();
        let handled = dispatch(&mut m, &Event::named(sym::PLAY, 0)).unwrap();
        assert!(!handled);
        assert!(m.trace.is_empty());
    }

    #[test]
    fn handler_lookup_walks_toward_root() {
        let mut m = started();
        // NOTE is handled on A while the leaf is A1
        let handled = dispatch(&mut m, &Event::named(NOTE, 0)).unwrap();
        assert!(handled);
        assert_eq!(m.trace, vec!["note@A"]);
        assert_eq!(m.leaf_changes, 0);
    }
}

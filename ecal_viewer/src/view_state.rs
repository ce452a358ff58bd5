// THEORY:
// What the viewer draws is decided by a small set of independent toggles. The
// state belongs to the viewer alone; the trigger engine never sees it. Each
// toggle can be flipped on its own, and flipping twice restores the previous
// picture.

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ViewToggle {
    /// Cluster outlines.
    Boundaries,
    /// Blend the fill of modules shared between clusters.
    ColorOverlap,
    /// Hide the full module grid and the sampling region; draw only the logic.
    CrescentMode,
    /// Print each sampling node's index.
    NodeIndex,
    /// Print each module's cell id.
    ModuleIndex,
}

impl ViewToggle {
    pub const ALL: [ViewToggle; 5] = [
        ViewToggle::Boundaries,
        ViewToggle::ColorOverlap,
        ViewToggle::CrescentMode,
        ViewToggle::NodeIndex,
        ViewToggle::ModuleIndex,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub show_boundaries: bool,
    pub show_color_overlap: bool,
    pub show_crescent_mode: bool,
    pub show_node_index: bool,
    pub show_module_index: bool,
}

impl ViewState {
    /// A state with exactly the given toggles switched on.
    pub fn with(toggles: &[ViewToggle]) -> Self {
        let mut state = ViewState::default();
        for toggle in toggles {
            if !state.is_on(*toggle) {
                state.toggle(*toggle);
            }
        }
        state
    }

    fn flag(&mut self, toggle: ViewToggle) -> &mut bool {
        match toggle {
            ViewToggle::Boundaries => &mut self.show_boundaries,
            ViewToggle::ColorOverlap => &mut self.show_color_overlap,
            ViewToggle::CrescentMode => &mut self.show_crescent_mode,
            ViewToggle::NodeIndex => &mut self.show_node_index,
            ViewToggle::ModuleIndex => &mut self.show_module_index,
        }
    }

    pub fn toggle(&mut self, toggle: ViewToggle) {
        let flag = self.flag(toggle);
        *flag = !*flag;
    }

    pub fn is_on(&self, toggle: ViewToggle) -> bool {
        match toggle {
            ViewToggle::Boundaries => self.show_boundaries,
            ViewToggle::ColorOverlap => self.show_color_overlap,
            ViewToggle::CrescentMode => self.show_crescent_mode,
            ViewToggle::NodeIndex => self.show_node_index,
            ViewToggle::ModuleIndex => self.show_module_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_everything_off() {
        let state = ViewState::default();
        assert!(ViewToggle::ALL.iter().all(|t| !state.is_on(*t)));
    }

    #[test]
    fn toggles_are_independent_and_reversible() {
        for toggle in ViewToggle::ALL {
            let mut state = ViewState::default();
            state.toggle(toggle);
            assert!(state.is_on(toggle));
            let others_on = ViewToggle::ALL.iter().filter(|t| **t != toggle && state.is_on(**t)).count();
            assert_eq!(others_on, 0);
            state.toggle(toggle);
            assert_eq!(state, ViewState::default());
        }
    }

    #[test]
    fn with_ignores_repeats() {
        let state = ViewState::with(&[ViewToggle::Boundaries, ViewToggle::Boundaries, ViewToggle::NodeIndex]);
        assert!(state.show_boundaries);
        assert!(state.show_node_index);
        assert!(!state.show_color_overlap);
    }
}

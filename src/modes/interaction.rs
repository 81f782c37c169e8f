/// Position of a run in the current partition of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub usize);

/// Pointer input delivered by the UI layer for a highlighted run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Enter(RunId),
    Leave(RunId),
    Click(RunId),
    /// The armed run's remove control was pressed
    ConfirmRemove,
}

/// What the overlay currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionPhase {
    Idle,
    TooltipShown(RunId),
    /// The remove control is exposed on `run`; `tooltip` is the run whose
    /// translation is visible, which need not be the armed one
    RemoveArmed { run: RunId, tooltip: Option<RunId> },
}

/// Tooltip and remove-arming state for the highlighted runs of one render.
///
/// Tooltip visibility follows the pointer; arming follows clicks. At most
/// one run is armed at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionState {
    tooltip: Option<RunId>,
    armed: Option<RunId>,
}

impl InteractionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> InteractionPhase {
        match (self.armed, self.tooltip) {
            (Some(run), tooltip) => InteractionPhase::RemoveArmed { run, tooltip },
            (None, Some(run)) => InteractionPhase::TooltipShown(run),
            (None, None) => InteractionPhase::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == InteractionPhase::Idle
    }

    /// Run whose translation tooltip is visible
    pub fn tooltip(&self) -> Option<RunId> {
        self.tooltip
    }

    /// Run whose remove control is exposed
    pub fn armed(&self) -> Option<RunId> {
        self.armed
    }

    /// Shows the tooltip for `run`. Runs without a translation show nothing.
    pub fn pointer_enter(&mut self, run: RunId, has_translation: bool) {
        if has_translation {
            self.tooltip = Some(run);
        }
    }

    /// Hides the tooltip if it belongs to `run`; arming is untouched
    pub fn pointer_leave(&mut self, run: RunId) {
        if self.tooltip == Some(run) {
            self.tooltip = None;
        }
    }

    /// Toggles arming for `run`, moving it away from any other armed run
    pub fn click(&mut self, run: RunId) {
        self.armed = if self.armed == Some(run) {
            None
        } else {
            Some(run)
        };
    }

    /// Consumes the armed run and returns to idle.
    /// Returns None (and changes nothing) when no run is armed.
    pub fn confirm_remove(&mut self) -> Option<RunId> {
        let run = self.armed?;
        self.reset();
        Some(run)
    }

    /// Back to idle, used whenever the runs are recomputed structurally
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

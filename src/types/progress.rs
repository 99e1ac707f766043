/// Receives coarse progress milestones of a build. Advisory only: implementations must not
/// block, and nothing in a build depends on them.
///
/// Implemented for any `Fn(u8, &str)`.
pub trait ProgressObserver {
    fn on_progress(&self, percent: u8, message: &str);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8, &str),
{
    fn on_progress(&self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Observer that ignores every milestone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _percent: u8, _message: &str) {}
}

/// Prevent the inner value from being verbosely / pretty printed during a debug.
pub(crate) struct NoPrettyPrint<T: std::fmt::Debug>(pub T);

impl<T: std::fmt::Debug> std::fmt::Debug for NoPrettyPrint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Prevent "{:#?}" from being used.
        write!(f, "{:?}", self.0)
    }
}

/// Abort on non-finite intermediate results instead of letting garbage
/// propagate into the sampling distribution.
pub(crate) fn assert_finite(x: f64, what: &str) -> f64 {
    assert!(x.is_finite(), "non-finite {what}: {x}");
    x
}

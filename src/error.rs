/// An error that can be traced back to a line of the input listing.
pub trait PositionalError {
    /// One-based line number.
    fn line(&self) -> usize;
    fn describe(&self) -> String;
}

//! Painting operations: everything that turns user gestures into pixel
//! writes. Each operation produces a history command so the session can undo
//! it as a unit.

pub mod brush;
pub mod fill;
pub mod shapes;

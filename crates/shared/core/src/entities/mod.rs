mod bar;
mod cursor;
mod interval;
mod side;
mod tick;

pub use bar::Bar;
pub use cursor::ReplayCursor;
pub use interval::Interval;
pub use side::AggressorSide;
pub use tick::TradeTick;

pub mod join;
pub mod palette;
pub mod popup;
pub mod room;

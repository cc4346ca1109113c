pub mod chrome;
pub mod form_widget;
pub mod wizard;

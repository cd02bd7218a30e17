//! This module contains user interface components which are reused between
//! the organizer, judge and public pages.

pub mod actions;
pub mod alert;
pub mod non_public;

//! Multiple-choice practice sessions served over HTTP and WebSocket.
//!
//! Question sets live in a [`content::QuestionStore`]. Each page view becomes a
//! [`session`] actor that discovers the available sets, loads the requested
//! one, renders shuffled cards and reacts to answers.

pub mod config;
pub mod content;
pub mod error;
pub mod practice;
pub mod session;
pub mod state;
pub mod web;

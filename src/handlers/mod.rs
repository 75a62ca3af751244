//! HTTP handlers for the generated resource routes.

pub mod resource;
pub use resource::*;

//! Cloud provider modules.
//!
//! Only IONOS Cloud is provided; see [`ionos`].

pub mod ionos;

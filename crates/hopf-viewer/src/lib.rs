//! Interactive GPU visualisation of the Hopf fibration.
//!
//! Base points on S² are animated by compute shaders, lifted to their
//! circles in S³ and stereographically projected to R³, where they are
//! extruded into lit tubes. Two viewports show the fibers and the base
//! points; clicking one hands its camera to a background updater thread.

pub mod app;
pub mod camera;
pub mod camera_updater;
pub mod config;
pub mod gpu;
pub mod input;
pub mod renderer;
pub mod sim;
pub mod ui;
pub mod viewport;
pub mod views;

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod collate;
pub mod column;
pub mod controller;
pub mod editor;
pub mod export;
pub mod filter;
pub mod gesture;
pub mod ids;
pub mod layout;
pub mod massop;
pub mod selection;
pub mod settings;
pub mod sort;
pub mod state;
pub mod timeparse;
pub mod transform;

pub use collate::*;
pub use column::*;
pub use controller::*;
pub use editor::*;
pub use export::*;
pub use filter::*;
pub use gesture::*;
pub use ids::*;
pub use layout::*;
pub use massop::*;
pub use selection::*;
pub use settings::*;
pub use sort::*;
pub use state::*;
pub use timeparse::*;
pub use transform::*;

pub mod drafting;

pub use drafting::{DraftingActor, DraftingArguments, DraftingError, DraftingMsg};

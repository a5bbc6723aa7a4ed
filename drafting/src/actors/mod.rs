pub mod session;

pub use session::{
    DraftingSessionActor, DraftingSessionArguments, DraftingSessionMsg, DraftingSessionState,
};

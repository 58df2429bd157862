//! `stockline-transfer` — inter-branch transfer (IBT).
//!
//! Moves stock between two warehouses through approval, picking, shipping
//! and receiving. Source stock is decremented only at ship, destination
//! stock incremented only at receive; in-transit differences are recorded,
//! never silently corrected.

pub mod ibt;

pub use ibt::{
    AddIbtLine, ApproveIbt, CancelIbt, CreateIbt, Ibt, IbtCommand, IbtEvent, IbtId, IbtLine,
    IbtStatus, ReceiveIbt, ReceiveLineQty, ShipIbt, ShipLineQty, StartPicking, SubmitIbt,
};

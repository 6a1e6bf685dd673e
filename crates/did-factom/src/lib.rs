//! Resolution of `did:factom` Decentralized Identifiers.
//!
//! A `did:factom` identity lives on its own Factom chain. The first entry of
//! that chain declares the identity's name and an ordered list of public keys;
//! the order of that list is the keys' priority, with the first key holding the
//! most authority. Later entries may replace one key with another, as long as
//! the replacement is signed by a key of equal or higher authority than the one
//! being replaced.
//!
//! This crate does no I/O. Given the entries of an identity chain, oldest
//! first, [`replay`] validates the genesis entry, applies every authorized key
//! replacement in order, and produces an [`IdentityState`]. That state can then
//! be projected into a resolvable DID document with
//! [`IdentityState::to_resolution`].
//!
//! For more info on what a Decentralized Identifier aka "DID" is, see the
//! [W3C recommendation][did-core].
//!
//! [did-core]: https://www.w3.org/TR/did-core/

#![forbid(unsafe_code)]

pub mod did;
pub mod document;
pub mod entry;
pub mod genesis;
pub mod idkey;
pub mod replay;
pub mod rotation;
pub mod state;

pub use crate::{
	did::{FactomDid, Network},
	document::Resolution,
	entry::{Entry, Stage},
	idkey::{IdPubKey, IdSecKey},
	replay::{replay, Replay, ReplayError},
	state::IdentityState,
};

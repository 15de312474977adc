//! Wire types shared by the ice server and its clients.
//!
//! Every message exchanged over a client channel is an [`Envelope`]: a tenant
//! id (`app`), a direction ([`MessageKind`]), an operation ([`Op`]), an
//! optional correlation id, and exactly one typed [`Payload`]. Envelopes are
//! framed as one JSON document per line by [`FrameReader`] and
//! [`FrameWriter`].
//!
//! ## Operations
//!
//! | op            | direction              | correlated | request → response              |
//! |---------------|------------------------|------------|---------------------------------|
//! | `CLAZZ_CHECK` | server → client → server | yes      | class + node tag → [`ClazzCheck`] |
//! | `UPDATE`      | server → client        | no         | [`TransferDto`] → none          |
//! | `SHOW_CONF`   | server → client → server | yes      | conf id → [`ShowConf`] or none  |
//! | `MOCK`        | server → client → server | yes      | [`Pack`] → list of [`Context`]  |
//! | `INIT`        | client → server        | no         | client address → none           |
//! | `SLAP`        | client → server        | no         | client address → none           |
//!
//! The display tree types in [`show`] describe the materialized view of a
//! client's rule tree returned by `SHOW_CONF`.

mod codec;
mod envelope;
mod errors;
mod id;
mod model;
mod node;
pub mod show;

pub use codec::{FrameReader, FrameWriter, MAX_FRAME_BYTES};
pub use envelope::{Envelope, MessageKind, Op, Payload};
pub use errors::CodecError;
pub use id::{REQUEST_ID_LEN, generate_request_id};
pub use model::{ClazzCheck, Context, Pack, TransferDto};
pub use node::{NodeType, TimeType, UnknownTag};
pub use show::{NodeConf, ShowConf, ShowNode};

#[cfg(test)]
mod tests;

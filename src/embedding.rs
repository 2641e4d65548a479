//! Similarity backends.
//!
//! Text backends implement [`TextEncoder`], image backends implement
//! [`ImageEncoder`]. Every encoder reports a [`BackendIdentity`] that is stored
//! with the generation it built, and query encoding is routed by that identity.

pub mod backend;
pub mod dense;
pub mod lexical;
pub mod perceptual;
pub mod remote;
pub mod retry;
pub mod visual;

pub use self::backend::{
    BackendIdentity, BackendKind, EncodePool, EncoderState, ImageEncoder, TextCorpusEncoding,
    TextEncoder,
};
pub use self::dense::LocalDenseEncoder;
pub use self::lexical::{LexicalEncoder, TfIdfModel};
pub use self::perceptual::PerceptualColorEncoder;
pub use self::remote::RemoteEmbeddingBackend;
pub use self::retry::RetryPolicy;
pub use self::visual::RemoteVisualBackend;

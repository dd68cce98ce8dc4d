//! The registry of HTJ2K codecs.
//!
//! A [`CodecRegistry`] starts out unregistered.
//! [Registering](CodecRegistry::register) publishes the codec parameters
//! and the codestream library to be used by all HTJ2K codecs,
//! which can then be retrieved by transfer syntax.
//! [Deregistering](CodecRegistry::deregister) returns the registry
//! to its initial state.
//!
//! The registry holds no global state.
//! Its owner is responsible for not deregistering
//! while codecs obtained from it are still in use elsewhere;
//! such codecs keep working with the parameters they were created with.

use crate::codec::{CodecRole, Htj2kCodec};
use crate::codestream::Codestream;
use crate::entries::{is_native_transfer_syntax, Htj2kVariant};
use crate::error::{
    IllegalOperationSnafu, NotRegisteredSnafu, Result, UnsupportedTransferSyntaxSnafu,
};
use crate::params::CodecParameters;
use snafu::OptionExt;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The published state of a registered registry.
struct Registration {
    params: Arc<CodecParameters>,
    engine: Arc<dyn Codestream + Send + Sync>,
}

/// An explicit registry of the HTJ2K decoders and encoders.
#[derive(Default)]
pub struct CodecRegistry {
    registration: Option<Registration>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field(
                "params",
                &self.registration.as_ref().map(|r| &r.params),
            )
            .finish()
    }
}

impl CodecRegistry {
    /// Create an unregistered codec registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec registry which is already registered.
    pub fn with_codecs<E>(params: CodecParameters, engine: E) -> Self
    where
        E: Codestream + Send + Sync + 'static,
    {
        let mut registry = Self::new();
        registry.register(params, engine);
        registry
    }

    /// Register the HTJ2K codecs
    /// with the given parameters and codestream library.
    ///
    /// Returns `false` and changes nothing
    /// if the codecs were already registered.
    pub fn register<E>(&mut self, params: CodecParameters, engine: E) -> bool
    where
        E: Codestream + Send + Sync + 'static,
    {
        if self.registration.is_some() {
            return false;
        }
        debug!("Registering HTJ2K codecs with {:?}", params);
        self.registration = Some(Registration {
            params: Arc::new(params),
            engine: Arc::new(engine),
        });
        true
    }

    /// Deregister the HTJ2K codecs.
    ///
    /// Returns `false` if the codecs were not registered.
    pub fn deregister(&mut self) -> bool {
        let registered = self.registration.take().is_some();
        if registered {
            debug!("Deregistered HTJ2K codecs");
        }
        registered
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }

    /// The codec parameters in effect.
    pub fn parameters(&self) -> Result<&CodecParameters> {
        self.registration
            .as_ref()
            .map(|r| &*r.params)
            .context(NotRegisteredSnafu)
    }

    /// The transfer syntaxes handled by the registered codecs.
    pub fn transfer_syntaxes(&self) -> impl Iterator<Item = &'static str> {
        let registered = self.is_registered();
        Htj2kVariant::ALL
            .into_iter()
            .filter(move |_| registered)
            .map(Htj2kVariant::uid)
    }

    fn codec(&self, transfer_syntax: &str, role: CodecRole) -> Result<Htj2kCodec> {
        let registration = self.registration.as_ref().context(NotRegisteredSnafu)?;
        let variant =
            Htj2kVariant::from_uid(transfer_syntax).context(UnsupportedTransferSyntaxSnafu {
                uid: transfer_syntax,
            })?;
        Ok(Htj2kCodec::new(
            variant,
            role,
            Arc::clone(&registration.params),
            Arc::clone(&registration.engine),
        ))
    }

    /// Obtain the decoder of an HTJ2K transfer syntax.
    pub fn decoder(&self, transfer_syntax: &str) -> Result<Htj2kCodec> {
        self.codec(transfer_syntax, CodecRole::Decoder)
    }

    /// Obtain the encoder to an HTJ2K transfer syntax.
    pub fn encoder(&self, transfer_syntax: &str) -> Result<Htj2kCodec> {
        self.codec(transfer_syntax, CodecRole::Encoder)
    }

    /// Obtain the codec which transcodes pixel data
    /// from one transfer syntax to the other.
    ///
    /// Transcoding between two HTJ2K transfer syntaxes
    /// is an illegal operation.
    pub fn transcoder(&self, from: &str, to: &str) -> Result<Htj2kCodec> {
        let from_htj2k = Htj2kVariant::from_uid(from).is_some();
        let to_htj2k = Htj2kVariant::from_uid(to).is_some();
        match (from_htj2k, to_htj2k) {
            (true, true) => IllegalOperationSnafu {
                operation: "re-encoding compressed pixel data",
            }
            .fail(),
            (true, false) if is_native_transfer_syntax(to) => self.decoder(from),
            (false, true) if is_native_transfer_syntax(from) => self.encoder(to),
            (true, false) => UnsupportedTransferSyntaxSnafu { uid: to }.fail(),
            (false, _) => UnsupportedTransferSyntaxSnafu { uid: from }.fail(),
        }
    }
}

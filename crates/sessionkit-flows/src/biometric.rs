//! Biometric sign-in: capability check, enable, disable, authenticate.
//!
//! The controller is stateless apart from the platform and the prompt it
//! shows, so it is cheap to clone into a spawned task.

use std::sync::Arc;

use sessionkit_client::{AuthClient, ClientError, Platform};
use sessionkit_types::{AuthResult, BiometricPrompt};
use tracing::{debug, info, warn};

/// Result of an availability check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BiometricStatus {
    /// The device could do biometric sign-in.
    pub available: bool,
    /// A biometric key is enrolled for the current session.
    pub enabled: bool,
}

#[derive(Debug)]
pub struct BiometricController<P> {
    platform: Arc<P>,
    prompt: BiometricPrompt,
}

impl<P> Clone for BiometricController<P> {
    fn clone(&self) -> Self {
        Self {
            platform: Arc::clone(&self.platform),
            prompt: self.prompt.clone(),
        }
    }
}

impl<P: Platform> BiometricController<P> {
    pub fn new(platform: Arc<P>, prompt: BiometricPrompt) -> Self {
        Self { platform, prompt }
    }

    pub fn prompt(&self) -> &BiometricPrompt {
        &self.prompt
    }

    /// Best-effort status read. Any failure reads as "unavailable"; this
    /// never surfaces an error.
    pub fn refresh_availability<C: AuthClient>(&self, client: &C) -> BiometricStatus {
        if !self.platform.biometric_capable() {
            debug!("platform has no biometric capability");
            return BiometricStatus::default();
        }
        if let Err(e) = client.check_biometric_supported(self.prompt.allowed_authenticators) {
            debug!(error = %e, "biometric not supported");
            return BiometricStatus::default();
        }
        match client.is_biometric_enabled() {
            Ok(enabled) => BiometricStatus {
                available: true,
                enabled,
            },
            Err(e) => {
                warn!(error = %e, "biometric enrollment check failed");
                BiometricStatus::default()
            }
        }
    }

    /// Creates the biometric key, after a capability pre-check.
    ///
    /// # Errors
    /// The pre-check failure (unclassified), or whatever the client reports.
    pub async fn enable<C: AuthClient>(self, client: Arc<C>) -> Result<(), ClientError> {
        self.precheck(&*client)?;
        client.enable_biometric(self.prompt.clone()).await?;
        info!("biometric enabled");
        Ok(())
    }

    pub fn disable<C: AuthClient>(&self, client: &C) -> Result<(), ClientError> {
        client.disable_biometric()?;
        info!("biometric disabled");
        Ok(())
    }

    /// Signs in with the biometric key.
    pub async fn authenticate<C: AuthClient>(
        self,
        client: Arc<C>,
    ) -> Result<AuthResult, ClientError> {
        self.precheck(&*client)?;
        let result = client.authenticate_biometric(self.prompt.clone()).await?;
        info!(sub = %result.user_info.sub, "biometric sign-in succeeded");
        Ok(result)
    }

    fn precheck<C: AuthClient>(&self, client: &C) -> Result<(), ClientError> {
        if !self.platform.biometric_capable() {
            return Err(ClientError::BiometricNotSupportedOrPermissionDenied);
        }
        client.check_biometric_supported(self.prompt.allowed_authenticators)
    }
}

//! Promotion and rollback of the production environment.
//!
//! The controller owns the environment lifecycle transitions of the
//! registry: a promotion records the superseded production version as the
//! rollback target, and a rollback consumes that target exactly once. The
//! registry is only ever written after the cluster operation fully
//! succeeded, so a failed promotion leaves no partial state behind.

use std::sync::Arc;
use std::time::Duration;

use skylift_build::image_tag;
use skylift_core::{AppName, BuildVersion, Environment};
use tracing::{error, info, instrument, warn};

use crate::cluster::ClusterControl;
use crate::error::{ControlError, ControlResult};
use crate::registry::AppStore;
use crate::types::{AppRecord, AppStatus};

/// Drives promotion and rollback against the production environment.
pub struct LifecycleController {
    store: Arc<dyn AppStore>,
    cluster: Arc<dyn ClusterControl>,
    registry_host: String,
    rollout_timeout: Duration,
}

impl LifecycleController {
    /// Create a controller over the given collaborators.
    pub fn new(
        store: Arc<dyn AppStore>,
        cluster: Arc<dyn ClusterControl>,
        registry_host: impl Into<String>,
        rollout_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cluster,
            registry_host: registry_host.into(),
            rollout_timeout,
        }
    }

    /// Promote the current preview version to production.
    ///
    /// On failure the previous production version, when one existed, is
    /// re-applied once (best effort) and the registry is left unchanged.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn promote(&self, app: &AppName) -> ControlResult<AppRecord> {
        let record = self.store.get(app).await?;
        let Some(preview) = record.preview_version.clone() else {
            return Err(ControlError::NothingToPromote(app.to_string()));
        };
        let previous_prod = record.prod_version.clone();

        let image = image_tag(&self.registry_host, app, &preview);
        info!(image = %image, "promoting preview to production");

        if let Err(reason) = self.apply_to_prod(app, &image).await {
            let reverted = self.revert_prod(app, previous_prod.as_ref()).await;
            return Err(ControlError::PromotionFailed {
                app: app.to_string(),
                reason,
                reverted,
            });
        }

        let updated = self
            .store
            .update(
                app,
                Box::new(move |rec| {
                    rec.prod_version = Some(preview);
                    rec.rollback_version = previous_prod;
                    rec.status = AppStatus::Published;
                }),
            )
            .await?;

        info!("promotion complete");
        Ok(updated)
    }

    /// Roll production back.
    ///
    /// With a rollback target recorded by the last promotion, that exact
    /// version is re-applied and the single-use target is cleared. Without
    /// one, production is reverted to its immediately preceding revision
    /// via the orchestrator's native history, with no registry bookkeeping.
    #[instrument(skip(self), fields(app = %app))]
    pub async fn rollback(&self, app: &AppName) -> ControlResult<AppRecord> {
        let record = self.store.get(app).await?;

        if let Some(target) = record.rollback_version.clone() {
            let image = image_tag(&self.registry_host, app, &target);
            info!(image = %image, "rolling back to recorded version");

            self.cluster
                .set_image(app, Environment::Prod, &image)
                .await?;
            self.wait_for_prod(app).await?;

            let updated = self
                .store
                .update(
                    app,
                    Box::new(move |rec| {
                        rec.prod_version = Some(target);
                        rec.rollback_version = None;
                    }),
                )
                .await?;
            info!("rollback complete");
            Ok(updated)
        } else {
            warn!("no rollback version recorded, using native revision undo");
            self.cluster.rollout_undo(app, Environment::Prod).await?;
            self.wait_for_prod(app).await?;
            Ok(record)
        }
    }

    /// Apply an image to production and wait for readiness.
    ///
    /// Returns the failure reason rather than an error so the caller can
    /// attach revert information.
    async fn apply_to_prod(&self, app: &AppName, image: &str) -> Result<(), String> {
        self.cluster
            .deploy(app, Environment::Prod, image)
            .await
            .map_err(|e| e.to_string())?;

        let ready = self
            .cluster
            .rollout_status(app, Environment::Prod, self.rollout_timeout)
            .await
            .map_err(|e| e.to_string())?;

        if ready {
            Ok(())
        } else {
            Err(format!(
                "prod rollout not ready within {}s",
                self.rollout_timeout.as_secs()
            ))
        }
    }

    /// Re-apply the previous production version after a failed promotion.
    ///
    /// Attempted exactly once; its own failure is reported but not retried.
    async fn revert_prod(&self, app: &AppName, previous: Option<&BuildVersion>) -> bool {
        let Some(previous) = previous else {
            return false;
        };

        let image = image_tag(&self.registry_host, app, previous);
        match self.cluster.set_image(app, Environment::Prod, &image).await {
            Ok(()) => {
                info!(image = %image, "reverted production to previous version");
                true
            }
            Err(e) => {
                error!(error = %e, "automatic revert failed");
                false
            }
        }
    }

    async fn wait_for_prod(&self, app: &AppName) -> ControlResult<()> {
        let ready = self
            .cluster
            .rollout_status(app, Environment::Prod, self.rollout_timeout)
            .await?;
        if ready {
            Ok(())
        } else {
            Err(ControlError::RolloutTimeout {
                deployment: format!("{app}-prod"),
                timeout_secs: self.rollout_timeout.as_secs(),
            })
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("registry_host", &self.registry_host)
            .finish_non_exhaustive()
    }
}

// User service with audit logging
// Each operation: establish context -> run directory op -> build event -> dispatch -> release context

use super::{ServiceError, StartupError};
use crate::audit::{AuditAction, AuditLogger, AuditScope, SinkError};
use crate::config::ConfigError;
use crate::directory::{Directory, DirectoryError, MemoryDirectory};
use crate::metrics::AuditMetrics;
use crate::models::{AppConfig, User, resource_for, sample_users};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};

/// Attribution used when no identity is known
pub const UNKNOWN_ACTOR: &str = "unknown";

/// Audited access to the identity directory.
///
/// Every call produces one audit event. Under durable delivery a sink failure
/// fails the call and any mutation it made is rolled back, with a compensating
/// FAILURE event recorded against the same correlation id. Under streaming
/// delivery the directory outcome is authoritative.
pub struct UserService {
    core: Arc<Core>,
}

struct Core {
    directory: Arc<dyn Directory>,
    audit: AuditLogger,
}

impl UserService {
    pub fn new(directory: Arc<dyn Directory>, audit: AuditLogger) -> Self {
        Self {
            core: Arc::new(Core { directory, audit }),
        }
    }

    /// Assemble the service described by `config`
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        config.validate().map_err(ConfigError::Invalid)?;

        let metrics = Arc::new(AuditMetrics::new()?);
        let audit = AuditLogger::from_config(config, metrics).await?;

        let directory = if config.directory.seed_sample_users {
            MemoryDirectory::with_users(sample_users())?
        } else {
            MemoryDirectory::new()
        };

        let service = Self::new(Arc::new(directory), audit);
        service.core.refresh_record_gauge().await;

        info!(
            "User service ready with {} record(s)",
            service.core.directory.len().await
        );
        Ok(service)
    }

    /// Add a new user, generating an id when none is supplied.
    ///
    /// The insert, its audit record and any rollback run to completion even if
    /// the returned future is dropped.
    pub async fn add_user(
        &self,
        user: User,
        requester_id: &str,
        reason: &str,
    ) -> Result<User, ServiceError> {
        let scope = self.core.audit.begin(requester_id, AuditAction::Add);
        let span = scope.span().clone();
        let core = self.core.clone();
        let reason = reason.to_string();

        let task = tokio::spawn(
            async move { core.add_in(&scope, user, &reason).await }.instrument(span),
        );
        join_mutation(task).await
    }

    /// Remove a user and return the removed record.
    ///
    /// Like [`UserService::add_user`], completes even if the caller stops waiting.
    pub async fn remove_user(
        &self,
        user_id: &str,
        requester_id: &str,
        reason: &str,
    ) -> Result<User, ServiceError> {
        let scope = self.core.audit.begin(requester_id, AuditAction::Remove);
        let span = scope.span().clone();
        let core = self.core.clone();
        let user_id = user_id.to_string();
        let reason = reason.to_string();

        let task = tokio::spawn(
            async move { core.remove_in(&scope, &user_id, &reason).await }.instrument(span),
        );
        join_mutation(task).await
    }

    /// Get user details
    pub async fn get_user(&self, user_id: &str, requester_id: &str) -> Result<User, ServiceError> {
        let scope = self.core.audit.begin(requester_id, AuditAction::View);
        let span = scope.span().clone();
        self.core.view_in(&scope, user_id).instrument(span).await
    }

    /// Snapshot of every user
    pub async fn list_users(
        &self,
        requester_id: &str,
    ) -> Result<HashMap<String, User>, ServiceError> {
        let scope = self.core.audit.begin(requester_id, AuditAction::ViewAll);
        let span = scope.span().clone();
        self.core.list_in(&scope).instrument(span).await
    }

    /// Authenticate by username and secret.
    ///
    /// A miss is not an error: it returns `Ok(None)` and is audited as a
    /// failed login against `user/unknown`.
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, ServiceError> {
        let scope = self.core.audit.begin(UNKNOWN_ACTOR, AuditAction::Login);
        let span = scope.span().clone();
        self.core
            .login_in(&scope, username, secret)
            .instrument(span)
            .await
    }

    /// Record a logout for `user`
    pub async fn logout(&self, user: &User) -> Result<(), ServiceError> {
        let scope = self.core.audit.begin(&user.id, AuditAction::Logout);
        let span = scope.span().clone();
        self.core.logout_in(&scope, user).instrument(span).await
    }

    /// Record a logout for the user holding `username`
    pub async fn logout_username(&self, username: &str) -> Result<User, ServiceError> {
        if let Some(user) = self.core.directory.find_by_username(username).await {
            self.logout(&user).await?;
            return Ok(user);
        }

        let scope = self.core.audit.begin(UNKNOWN_ACTOR, AuditAction::Logout);
        let span = scope.span().clone();
        let error = DirectoryError::NotFound(username.to_string());
        Err(self
            .core
            .reject(&scope, &resource_for(UNKNOWN_ACTOR), error)
            .instrument(span)
            .await)
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.core.audit
    }

    /// Flush pending audit events and stop background delivery
    pub async fn shutdown(&self) {
        self.core.audit.shutdown().await;
    }
}

async fn join_mutation<T>(task: JoinHandle<Result<T, ServiceError>>) -> Result<T, ServiceError> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            error!("Audited mutation did not complete: {}", e);
            Err(ServiceError::SinkFault(SinkError::Closed))
        }
    }
}

impl Core {
    async fn add_in(
        &self,
        scope: &AuditScope,
        mut user: User,
        reason: &str,
    ) -> Result<User, ServiceError> {
        if user.id.is_empty() {
            user.id = User::generate_id(user.user_type);
        }
        let resource = user.resource();

        let stored = match self.directory.insert(user).await {
            Ok(stored) => stored,
            Err(e) => return Err(self.reject(scope, &resource, e).await),
        };

        let event = scope
            .event()
            .resource(&resource)
            .success(format!("Added user: {}", stored.display_name))
            .detail("reason", reason)
            .detail("added_user_type", stored.user_type.as_str())
            .build();

        if let Err(fault) = self.audit.log(event).await {
            // Nothing to undo if the record was already replaced or removed
            if self.directory.retract(&stored).await {
                warn!("Rolled back add of user {} after audit failure", stored.id);
                let message = format!("Rolled back add of user: {}", stored.display_name);
                self.compensate(scope, &resource, message, true, &fault)
                    .await;
            }
            return Err(ServiceError::SinkFault(fault));
        }

        self.refresh_record_gauge().await;
        Ok(stored)
    }

    async fn remove_in(
        &self,
        scope: &AuditScope,
        user_id: &str,
        reason: &str,
    ) -> Result<User, ServiceError> {
        let resource = resource_for(user_id);

        let removed = match self.directory.remove(user_id).await {
            Ok(removed) => removed,
            Err(e) => return Err(self.reject(scope, &resource, e).await),
        };

        let event = scope
            .event()
            .resource(&resource)
            .success(format!("Removed user: {}", removed.display_name))
            .detail("reason", reason)
            .detail("removed_user_type", removed.user_type.as_str())
            .build();

        if let Err(fault) = self.audit.log(event).await {
            match self.directory.insert(removed).await {
                Ok(restored) => {
                    warn!("Restored user {} after audit failure", user_id);
                    let message =
                        format!("Rolled back remove of user: {}", restored.display_name);
                    self.compensate(scope, &resource, message, true, &fault)
                        .await;
                }
                Err(conflict) => {
                    let message = format!(
                        "Failed to restore user {} after audit failure: {}",
                        user_id, conflict
                    );
                    error!("{}", message);
                    self.compensate(scope, &resource, message, false, &fault)
                        .await;
                }
            }
            self.refresh_record_gauge().await;
            return Err(ServiceError::SinkFault(fault));
        }

        self.refresh_record_gauge().await;
        Ok(removed)
    }

    async fn view_in(&self, scope: &AuditScope, user_id: &str) -> Result<User, ServiceError> {
        let resource = resource_for(user_id);

        let user = match self.directory.get(user_id).await {
            Ok(user) => user,
            Err(e) => return Err(self.reject(scope, &resource, e).await),
        };

        let event = scope
            .event()
            .resource(&resource)
            .success(format!(
                "User {} viewed user: {}",
                scope.context().acting_user_id(),
                user.display_name
            ))
            .build();
        self.audit.log(event).await?;

        Ok(user)
    }

    async fn list_in(&self, scope: &AuditScope) -> Result<HashMap<String, User>, ServiceError> {
        let users = self.directory.list().await;

        let event = scope
            .event()
            .resource("user")
            .success(format!(
                "User {} viewed all users",
                scope.context().acting_user_id()
            ))
            .detail("record_count", users.len())
            .build();
        self.audit.log(event).await?;

        Ok(users)
    }

    async fn login_in(
        &self,
        scope: &AuditScope,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, ServiceError> {
        let matched = self.directory.authenticate(username, secret).await;

        let builder = match &matched {
            Some(user) => scope
                .event()
                .acting_user(&user.id)
                .resource(user.resource())
                .success(format!("User {} logged in successfully", username)),
            None => scope
                .event()
                .resource(resource_for(UNKNOWN_ACTOR))
                .failure(format!("Failed login attempt for username: {}", username)),
        };
        self.audit.log(builder.build()).await?;

        Ok(matched)
    }

    async fn logout_in(&self, scope: &AuditScope, user: &User) -> Result<(), ServiceError> {
        let event = scope
            .event()
            .resource(user.resource())
            .success(format!("User {} logged out successfully", user.username))
            .build();
        self.audit.log(event).await?;
        Ok(())
    }

    /// Audit a validation failure, then hand back the error to raise
    async fn reject(
        &self,
        scope: &AuditScope,
        resource: &str,
        error: DirectoryError,
    ) -> ServiceError {
        let event = scope
            .event()
            .resource(resource)
            .failure(error.to_string())
            .build();

        match self.audit.log(event).await {
            Ok(()) => ServiceError::Validation(error),
            Err(sink_error) => {
                warn!(
                    "Audit failed while rejecting {} ({}): {}",
                    scope.action().as_str(),
                    error,
                    sink_error
                );
                ServiceError::SinkFault(sink_error)
            }
        }
    }

    /// Best-effort FAILURE event superseding a SUCCESS the sink may already hold
    async fn compensate(
        &self,
        scope: &AuditScope,
        resource: &str,
        message: String,
        rolled_back: bool,
        fault: &SinkError,
    ) {
        let event = scope
            .event()
            .resource(resource)
            .failure(message)
            .detail("rolled_back", rolled_back)
            .detail("audit_fault", fault.to_string())
            .build();

        if let Err(e) = self.audit.log(event).await {
            warn!("Compensating audit event for {} not recorded: {}", resource, e);
        }
    }

    async fn refresh_record_gauge(&self) {
        let count = self.directory.len().await;
        self.audit.metrics().directory_records.set(count as i64);
    }
}

//! Tenancy and visibility rules.
//!
//! A tenant is an admin plus the members that admin created. Admins see every
//! number and conversation their tenant owns; members see only what is
//! assigned to them.

use std::sync::Arc;

use async_trait::async_trait;
use database::{
    conversation, gateway, phone_number, user, Conversation, Database, Gateway, PhoneNumber, User,
};
use fanout::SubscriptionPolicy;
use sms_provider::{ProviderError, ProviderFactory, SmsProvider, NOT_CONFIGURED_MESSAGE};
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// The adapter a user's requests should go through.
pub struct ProviderContext {
    pub adapter: Arc<dyn SmsProvider>,
    pub tenant_id: i64,
    /// `None` means the tenant has no active gateway; `adapter` is then the
    /// unconfigured adapter.
    pub gateway: Option<Gateway>,
}

impl ProviderContext {
    /// The active gateway, or the not-configured error.
    pub fn require_gateway(&self) -> Result<&Gateway> {
        self.gateway.as_ref().ok_or_else(|| {
            GatewayError::Provider(ProviderError::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))
        })
    }
}

/// Resolves tenants, gateways and access.
pub struct TenancyPolicy {
    db: Database,
    providers: ProviderFactory,
}

impl TenancyPolicy {
    pub fn new(db: Database, providers: ProviderFactory) -> Self {
        Self { db, providers }
    }

    pub fn providers(&self) -> &ProviderFactory {
        &self.providers
    }

    /// An admin's tenant is themself; a member's tenant is their creator.
    pub async fn resolve_tenant(&self, user_id: i64) -> Result<i64> {
        let user = user::get_user(self.db.pool(), user_id).await?;
        Ok(user.tenant_id())
    }

    /// The single active gateway of a tenant, if any.
    pub async fn resolve_active_gateway(&self, tenant_id: i64) -> Result<Option<Gateway>> {
        Ok(gateway::get_active_gateway(self.db.pool(), tenant_id).await?)
    }

    /// Adapter, tenant and gateway for a user. No active gateway is a normal
    /// outcome and yields the unconfigured adapter.
    pub async fn resolve_provider_context(&self, user_id: i64) -> Result<ProviderContext> {
        let tenant_id = self.resolve_tenant(user_id).await?;
        self.context_for_tenant(tenant_id).await
    }

    pub async fn context_for_tenant(&self, tenant_id: i64) -> Result<ProviderContext> {
        let gateway = self.resolve_active_gateway(tenant_id).await?;
        let adapter = match &gateway {
            Some(gateway) => self.providers.create(gateway)?,
            None => {
                debug!(tenant_id, "No active gateway");
                self.providers.unconfigured()
            }
        };

        Ok(ProviderContext {
            adapter,
            tenant_id,
            gateway,
        })
    }

    /// The adapter that owns a number: its own gateway when still attached,
    /// otherwise the tenant's active gateway.
    pub async fn provider_for_number(&self, number: &PhoneNumber) -> Result<Arc<dyn SmsProvider>> {
        if let Some(gateway_id) = number.gateway_id {
            match gateway::get_gateway(self.db.pool(), gateway_id).await {
                Ok(gateway) if gateway.tenant_id == number.tenant_id => {
                    return Ok(self.providers.create(&gateway)?);
                }
                Ok(_) => warn!(
                    phone_number_id = number.id,
                    gateway_id, "Number points at a gateway of another tenant"
                ),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(self.context_for_tenant(number.tenant_id).await?.adapter)
    }

    pub fn require_admin(user: &User) -> Result<()> {
        if user.is_admin() {
            Ok(())
        } else {
            Err(GatewayError::Forbidden)
        }
    }

    pub fn can_see_number(user: &User, number: &PhoneNumber) -> bool {
        if number.tenant_id != user.tenant_id() {
            return false;
        }
        user.is_admin() || number.assigned_user_id == Some(user.id)
    }

    pub fn can_see_conversation(user: &User, number: &PhoneNumber, conversation: &Conversation) -> bool {
        if number.tenant_id != user.tenant_id() {
            return false;
        }
        user.is_admin()
            || number.assigned_user_id == Some(user.id)
            || conversation.assigned_user_id == Some(user.id)
    }

    pub async fn visible_numbers(&self, user: &User) -> Result<Vec<PhoneNumber>> {
        let numbers = if user.is_admin() {
            phone_number::list_for_tenant(self.db.pool(), user.id).await?
        } else {
            phone_number::list_assigned_to(self.db.pool(), user.id).await?
        };
        Ok(numbers)
    }

    pub async fn visible_conversations(&self, user: &User) -> Result<Vec<Conversation>> {
        let conversations = if user.is_admin() {
            conversation::list_for_tenant(self.db.pool(), user.id).await?
        } else {
            conversation::list_for_assignee(self.db.pool(), user.id).await?
        };
        Ok(conversations)
    }

    /// Load a number the user may see.
    pub async fn authorize_number(&self, user: &User, phone_number_id: i64) -> Result<PhoneNumber> {
        let number = phone_number::get_phone_number(self.db.pool(), phone_number_id).await?;
        if !Self::can_see_number(user, &number) {
            warn!(user_id = user.id, phone_number_id, "Phone number access denied");
            return Err(GatewayError::Forbidden);
        }
        Ok(number)
    }

    /// Load a conversation, and its number, that the user may see.
    pub async fn authorize_conversation(
        &self,
        user: &User,
        conversation_id: i64,
    ) -> Result<(Conversation, PhoneNumber)> {
        let conversation = conversation::get_conversation(self.db.pool(), conversation_id).await?;
        let number = phone_number::get_phone_number(self.db.pool(), conversation.phone_number_id).await?;
        if !Self::can_see_conversation(user, &number, &conversation) {
            warn!(user_id = user.id, conversation_id, "Conversation access denied");
            return Err(GatewayError::Forbidden);
        }
        Ok((conversation, number))
    }

    /// An assignee must belong to the tenant.
    pub async fn check_assignee(&self, tenant_id: i64, assignee_id: i64) -> Result<User> {
        match user::find_user(self.db.pool(), assignee_id).await? {
            Some(assignee) if assignee.tenant_id() == tenant_id => Ok(assignee),
            _ => Err(GatewayError::BadRequest(
                "Assignee must be a member of your team".to_string(),
            )),
        }
    }
}

#[async_trait]
impl SubscriptionPolicy for TenancyPolicy {
    async fn user_exists(&self, user_id: i64) -> bool {
        match user::find_user(self.db.pool(), user_id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(user_id, "User lookup failed: {}", e);
                false
            }
        }
    }

    async fn can_access_conversation(&self, user_id: i64, conversation_id: i64) -> bool {
        let user = match user::find_user(self.db.pool(), user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(e) => {
                warn!(user_id, "User lookup failed: {}", e);
                return false;
            }
        };

        match self.authorize_conversation(&user, conversation_id).await {
            Ok(_) => true,
            Err(GatewayError::Forbidden) => false,
            Err(GatewayError::Database(e)) if e.is_not_found() => false,
            Err(e) => {
                warn!(user_id, conversation_id, "Access check failed: {}", e);
                false
            }
        }
    }
}

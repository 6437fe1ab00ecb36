//! Organization/user directory collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use spend_card_types::AccountRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve_account(&self, user_id: &str) -> Option<AccountRef>;

    async fn is_admin(&self, account: AccountRef, org_id: &str) -> bool;
}

#[derive(Clone, Debug)]
struct Member {
    account: AccountRef,
    org_id: Option<String>,
    role: Role,
}

/// In-process directory.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    users: HashMap<String, Member>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(
        mut self,
        user_id: impl Into<String>,
        account: AccountRef,
        org_id: Option<&str>,
        role: Role,
    ) -> Self {
        self.users.insert(
            user_id.into(),
            Member {
                account,
                org_id: org_id.map(str::to_string),
                role,
            },
        );
        self
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn resolve_account(&self, user_id: &str) -> Option<AccountRef> {
        self.users.get(user_id).map(|member| member.account)
    }

    async fn is_admin(&self, account: AccountRef, org_id: &str) -> bool {
        self.users.values().any(|member| {
            member.account == account
                && member.role == Role::Admin
                && member.org_id.as_deref() == Some(org_id)
        })
    }
}

//! New-id discovery (§4.7): per operation-kind dispatch that learns about
//! accounts and permlinks not yet in the id-caches before an operation is
//! assigned its id.

use indexer_core::types::{OperationKind, RawOperation};
use indexer_storage::cache::{AccountCache, PermlinkCache};

/// Accounts newly discovered by this operation, in the order they should be
/// assigned ids (account-create variants contribute at most one; pow2 may
/// contribute several).
pub async fn discover_new_accounts(raw: &RawOperation, accounts: &AccountCache) -> Vec<String> {
    let candidates: Vec<String> = match raw.kind {
        OperationKind::AccountCreate
        | OperationKind::AccountCreateWithDelegation
        | OperationKind::CreateClaimedAccount => raw.new_account_name.iter().cloned().collect(),
        OperationKind::Pow => raw.new_account_name.iter().cloned().collect(),
        OperationKind::Pow2 => raw.accounts_impacted.clone(),
        _ => Vec::new(),
    };

    let mut discovered = Vec::new();
    for name in candidates {
        if !accounts.contains(&name).await {
            discovered.push(name);
        }
    }
    discovered
}

/// The permlink text discovered by a `comment` operation, if it is not
/// already cached. Editing an existing comment (same text already known)
/// contributes nothing — the existing id is reused (§3, §4.7).
pub async fn discover_new_permlink(raw: &RawOperation, permlinks: &PermlinkCache) -> Option<String> {
    if raw.kind != OperationKind::Comment {
        return None;
    }
    let text = raw.permlink_text.as_ref()?;
    if permlinks.get_id(text).await.is_some() {
        return None;
    }
    Some(text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexer_core::types::OperationBody;

    fn raw(kind: OperationKind) -> RawOperation {
        RawOperation {
            kind,
            trx_in_block: 0,
            op_in_trx: 0,
            accounts_impacted: Vec::new(),
            new_account_name: None,
            permlink_text: None,
            body: OperationBody::Packed(vec![]),
        }
    }

    #[tokio::test]
    async fn account_create_discovers_new_account_name() {
        let accounts = AccountCache::new();
        let mut op = raw(OperationKind::AccountCreate);
        op.new_account_name = Some("alice".into());

        let discovered = discover_new_accounts(&op, &accounts).await;
        assert_eq!(discovered, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn account_create_skips_already_known_name() {
        let accounts = AccountCache::new();
        accounts.insert_new("alice").await;
        let mut op = raw(OperationKind::AccountCreate);
        op.new_account_name = Some("alice".into());

        let discovered = discover_new_accounts(&op, &accounts).await;
        assert!(discovered.is_empty());
    }

    #[tokio::test]
    async fn pow2_discovers_all_impacted_unknown_accounts() {
        let accounts = AccountCache::new();
        accounts.insert_new("alice").await;
        let mut op = raw(OperationKind::Pow2);
        op.accounts_impacted = vec!["alice".into(), "bob".into()];

        let discovered = discover_new_accounts(&op, &accounts).await;
        assert_eq!(discovered, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn other_kinds_discover_nothing() {
        let accounts = AccountCache::new();
        let op = raw(OperationKind::ProducerReward);
        assert!(discover_new_accounts(&op, &accounts).await.is_empty());
    }

    #[tokio::test]
    async fn comment_discovers_new_permlink() {
        let permlinks = PermlinkCache::new();
        let mut op = raw(OperationKind::Comment);
        op.permlink_text = Some("hello".into());

        assert_eq!(discover_new_permlink(&op, &permlinks).await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn comment_edit_reuses_existing_permlink() {
        let permlinks = PermlinkCache::new();
        permlinks.get_or_insert("hello").await;
        let mut op = raw(OperationKind::Comment);
        op.permlink_text = Some("hello".into());

        assert_eq!(discover_new_permlink(&op, &permlinks).await, None);
    }
}

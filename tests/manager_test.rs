/// Wallet manager lifecycle tests
///
/// Load/initialize, adding mints, selecting the active wallet and
/// restoring everything from the file store after a restart.
mod common;

use std::sync::Arc;
use std::time::Duration;

use cashu_wallet_manager::storage::schema::{ActiveMintUrl, ActiveUnit, Mints, Proofs, Version};
use cashu_wallet_manager::storage::SchemaKey;
use cashu_wallet_manager::{CashuError, KvStore, TypedStore, WalletManager};
use common::{units, TestEnvironment, MINT_A, MINT_B};

/// Pay and mint `amount` into the active wallet, which must be at mint A
async fn fund_active_wallet(env: &TestEnvironment, manager: &WalletManager, amount: u64) {
    let wallet = manager.active_wallet().expect("active wallet");
    let invoice = wallet.generate_invoice(amount, None).await.unwrap();
    env.mint_a().pay(&invoice.checking_id);
    manager.check_mint_quote(&invoice.checking_id).await.unwrap();
}

// ============================================================================
// Test 1: First load initializes the schema
// ============================================================================

#[tokio::test]
async fn test_first_load_initializes_schema() {
    let env = TestEnvironment::new().expect("Failed to create test environment");
    let manager = env.manager();

    assert!(!manager.is_loaded());
    manager.load().await.expect("Failed to load");
    assert!(manager.is_loaded());

    assert!(env.store.try_get::<Version>().unwrap().is_some());
    assert!(env.store.get::<Mints>().unwrap().is_empty());
    assert_eq!(env.store.get::<ActiveUnit>().unwrap(), Some("sat".to_string()));
    assert_eq!(env.store.get::<ActiveMintUrl>().unwrap(), Some(String::new()));

    assert!(manager.wallets().is_empty());
    assert!(manager.active_wallet().is_none());
    assert!(manager.available_mints().is_empty());

    // second load is a no-op
    manager.load().await.expect("Reload should succeed");
    assert!(manager.is_loaded());
}

// ============================================================================
// Test 2: Adding a mint creates one wallet per requested unit
// ============================================================================

#[tokio::test]
async fn test_add_wallet_creates_wallet_per_unit() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();
    let mut changes = manager.subscribe_to_wallet_changes();

    let created = manager
        .add_wallet(MINT_A, &units(&["sat", "usd"]))
        .await
        .expect("Failed to add mint A");
    assert_eq!(created.len(), 2);

    let wallets = manager.wallets();
    assert_eq!(wallets.len(), 2);
    assert!(wallets.contains_key(&format!("{}-sat", MINT_A)));
    assert!(wallets.contains_key(&format!("{}-usd", MINT_A)));

    let usd = manager.wallet(&format!("{}-usd", MINT_A)).unwrap();
    assert_eq!(usd.unit(), "usd");
    assert_eq!(usd.keysets().len(), 1);
    assert_eq!(usd.keysets()[0].id, env.mint_a().keyset_id("usd"));
    assert_eq!(usd.keys().len(), 1);

    // first wallet added becomes active
    let active = manager.active_wallet().expect("active wallet");
    assert_eq!(active.mint_url(), MINT_A);
    assert_eq!(active.unit(), "sat");

    let snapshot = changes.recv().await.expect("wallet change event");
    assert_eq!(snapshot.len(), 2);

    let stored = env.store.get::<Mints>().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, MINT_A);
    assert_eq!(stored[0].keysets.len(), 2);
}

#[tokio::test]
async fn test_add_wallet_only_requested_units() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();

    manager.add_wallet(MINT_A, &units(&["usd"])).await.unwrap();

    assert_eq!(manager.available_units(), vec!["usd".to_string()]);
    let stored = env.store.get::<Mints>().unwrap();
    assert_eq!(stored[0].keysets.len(), 1);
    assert_eq!(stored[0].keysets[0].unit, "usd");
}

#[tokio::test]
async fn test_add_wallet_without_matching_units_fails_cleanly() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();

    let err = manager
        .add_wallet(MINT_B, &units(&["eur"]))
        .await
        .expect_err("mint B has no eur keyset");
    assert!(matches!(err, CashuError::NoKeysetsForUnits { .. }));

    assert!(manager.wallets().is_empty());
    assert!(env.store.get::<Mints>().unwrap().is_empty());
}

#[tokio::test]
async fn test_re_adding_mint_merges_record() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();

    manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
    manager
        .add_wallet(&format!("{}/", MINT_A), &units(&["sat", "usd"]))
        .await
        .unwrap();

    let stored = env.store.get::<Mints>().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].keysets.len(), 2);
    assert_eq!(manager.available_mints(), vec![MINT_A.to_string()]);
    assert_eq!(manager.wallets().len(), 2);
}

#[tokio::test]
async fn test_adding_another_unit_keeps_existing_wallets() {
    let env = TestEnvironment::new().unwrap();
    {
        let manager = env.loaded_manager().await.unwrap();
        manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
        fund_active_wallet(&env, &manager, 10).await;

        manager.add_wallet(MINT_A, &units(&["usd"])).await.unwrap();
        assert_eq!(manager.wallets().len(), 2);
    }

    let stored = env.store.get::<Mints>().unwrap();
    assert_eq!(stored.len(), 1);
    let mut stored_units: Vec<&str> = stored[0].keysets.iter().map(|k| k.unit.as_str()).collect();
    stored_units.sort();
    assert_eq!(stored_units, vec!["sat", "usd"]);
    assert_eq!(stored[0].keys.len(), 2);

    let restarted = env.loaded_manager().await.unwrap();
    assert_eq!(restarted.wallets().len(), 2);
    assert_eq!(restarted.wallet(&format!("{}-sat", MINT_A)).unwrap().get_balance().unwrap(), 10);
    assert_eq!(restarted.balances().unwrap().total(), 10);
}

#[tokio::test]
async fn test_re_adding_mint_keeps_active_wallet_instance() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();
    manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
    let before = manager.active_wallet().unwrap();

    let readded = manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
    let active = manager.active_wallet().unwrap();
    let registered = manager.wallet(&format!("{}-sat", MINT_A)).unwrap();
    assert!(Arc::ptr_eq(&active, &registered));
    assert!(Arc::ptr_eq(&active, &before));
    assert!(Arc::ptr_eq(&active, &readded[0]));

    // events from the active wallet reach manager subscribers
    let mut quotes = manager.subscribe_pending_mint_quote().unwrap();
    active.generate_invoice(5, None).await.unwrap();
    let update = tokio::time::timeout(Duration::from_secs(5), quotes.recv())
        .await
        .expect("quote event in time")
        .expect("subscription open");
    assert_eq!(update.wallet_id, active.id());
    assert_eq!(update.pending.len(), 1);
}

// ============================================================================
// Test 3: Active wallet selection
// ============================================================================

#[tokio::test]
async fn test_set_active_wallet_persists() {
    let env = TestEnvironment::new().unwrap();
    let manager = env.loaded_manager().await.unwrap();
    manager.add_wallet(MINT_A, &units(&["sat", "usd"])).await.unwrap();
    manager.add_wallet(MINT_B, &units(&["sat"])).await.unwrap();

    // still the first one
    assert_eq!(manager.active_wallet().unwrap().mint_url(), MINT_A);

    let wallet = manager.set_active_wallet(MINT_B, None).unwrap();
    assert_eq!(wallet.id(), format!("{}-sat", MINT_B));
    assert_eq!(env.store.get::<ActiveMintUrl>().unwrap(), Some(MINT_B.to_string()));

    manager.set_active_wallet(MINT_A, Some("usd")).unwrap();
    assert_eq!(manager.active_unit(), "usd");
    assert_eq!(env.store.get::<ActiveUnit>().unwrap(), Some("usd".to_string()));

    let err = manager
        .set_active_wallet(MINT_B, Some("usd"))
        .expect_err("mint B has no usd wallet");
    assert!(matches!(err, CashuError::WalletNotFound { .. }));
    // failed selection leaves the previous one in place
    assert_eq!(manager.active_wallet().unwrap().id(), format!("{}-usd", MINT_A));
}

// ============================================================================
// Test 4: Restart restores wallets and active selection
// ============================================================================

#[tokio::test]
async fn test_reload_restores_wallets() {
    let env = TestEnvironment::new().unwrap();
    {
        let manager = env.loaded_manager().await.unwrap();
        manager.add_wallet(MINT_A, &units(&["sat", "usd"])).await.unwrap();
        manager.add_wallet(MINT_B, &units(&["sat"])).await.unwrap();
        manager.set_active_wallet(MINT_B, Some("sat")).unwrap();
    }

    let restarted = env.manager();
    restarted.load().await.expect("Failed to reload");

    assert_eq!(restarted.wallets().len(), 3);
    assert_eq!(
        restarted.available_mints(),
        vec![MINT_A.to_string(), MINT_B.to_string()]
    );
    assert_eq!(
        restarted.available_units(),
        vec!["sat".to_string(), "usd".to_string()]
    );
    assert_eq!(restarted.active_wallet().unwrap().id(), format!("{}-sat", MINT_B));

    let sat_wallets = restarted.wallets_by_unit("sat");
    assert_eq!(sat_wallets.len(), 2);
    let mint_a = restarted.wallets_by_mint(MINT_A).unwrap();
    assert_eq!(mint_a.keys().cloned().collect::<Vec<_>>(), vec!["sat", "usd"]);
    assert!(restarted.wallets_by_mint("http://unknown.test").is_none());
}

#[tokio::test]
async fn test_stale_active_mint_is_ignored_on_load() {
    let env = TestEnvironment::new().unwrap();
    {
        let manager = env.loaded_manager().await.unwrap();
        manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
    }
    env.store
        .put::<ActiveMintUrl>(&Some("http://gone.test".to_string()))
        .unwrap();

    let restarted = env.loaded_manager().await.expect("load tolerates stale active mint");
    assert!(restarted.active_wallet().is_none());
    assert_eq!(restarted.wallets().len(), 1);
}

#[tokio::test]
async fn test_wait_for_load_resolves_after_load() {
    let env = TestEnvironment::new().unwrap();
    let manager = std::sync::Arc::new(env.manager());

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager.wait_for_load().await;
            manager.is_loaded()
        })
    };

    manager.load().await.unwrap();
    assert!(waiter.await.unwrap());
}

// ============================================================================
// Test 5: Schema version problems never wipe ecash
// ============================================================================

#[tokio::test]
async fn test_missing_version_keeps_proofs() {
    let env = TestEnvironment::new().unwrap();
    {
        let manager = env.loaded_manager().await.unwrap();
        manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
        fund_active_wallet(&env, &manager, 10).await;
    }
    env.store.remove::<Version>().unwrap();

    let restarted = env.loaded_manager().await.expect("load re-initializes the version");
    assert!(env.store.try_get::<Version>().unwrap().is_some());
    assert_eq!(restarted.wallets().len(), 1);
    assert_eq!(restarted.balances().unwrap().total(), 10);
    assert_eq!(restarted.active_wallet().unwrap().mint_url(), MINT_A);
}

#[tokio::test]
async fn test_unreadable_version_fails_load() {
    let env = TestEnvironment::new().unwrap();
    {
        let manager = env.loaded_manager().await.unwrap();
        manager.add_wallet(MINT_A, &units(&["sat"])).await.unwrap();
        fund_active_wallet(&env, &manager, 10).await;
    }
    let proofs = env.store.get::<Proofs>().unwrap();
    assert_eq!(proofs.len(), 2);
    env.store.put_raw(Version::KEY, "0.1.0-not-json").unwrap();

    let manager = env.manager();
    let err = manager.load().await.expect_err("unreadable version");
    assert!(matches!(err, CashuError::Storage(_)));
    assert!(!manager.is_loaded());
    assert_eq!(env.store.get::<Proofs>().unwrap(), proofs);
}

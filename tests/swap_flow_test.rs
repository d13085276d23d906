use refswap::domain::ports::TokenLedger;
use refswap::domain::swap::{SwapState, TokenSwap};
use refswap::domain::token::Token;
use refswap::error::SwapError;

mod common;
use common::*;

#[tokio::test]
async fn test_reference_scenario_settles_exactly() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), ONE_ETHER).await;

    let settlement = h
        .controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(ONE_ETHER, 2_976_000_000))
        .await
        .unwrap();

    // net = 0.992e18; 0.992e18 * 3000 * 1e6 / 1e18
    let expected_output = 992_000_000_000_000_000u128 * 3_000 * 1_000_000 / ONE_ETHER;
    assert_eq!(expected_output, 2_976_000_000);
    assert_eq!(settlement.commission1, 5_000_000_000_000_000);
    assert_eq!(settlement.commission2, 3_000_000_000_000_000);
    assert_eq!(settlement.output, expected_output);
    assert_eq!(settlement.gross_amount, ONE_ETHER);
    assert_eq!(settlement.caller, addr("alice"));

    assert_eq!(h.balance("alice", &usdc()).await, expected_output);
    assert_eq!(h.balance("ref-a", &weth()).await, 5_000_000_000_000_000);
    assert_eq!(h.balance("ref-b", &weth()).await, 3_000_000_000_000_000);
    assert_eq!(h.balance("router", &weth()).await, 992_000_000_000_000_000);
    assert_eq!(h.balance("proxy", &weth()).await, 0);
    assert_eq!(h.balance("proxy", &usdc()).await, 0);
    assert_eq!(h.custody("alice", &weth()).await, 0);
}

#[tokio::test]
async fn test_conservation_leaves_other_callers_untouched() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 10_000).await;
    h.fund_and_deposit("bob", &weth(), 7_000).await;

    h.controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(6_000, 0))
        .await
        .unwrap();

    assert_eq!(h.custody("alice", &weth()).await, 4_000);
    assert_eq!(h.custody("bob", &weth()).await, 7_000);
    assert_eq!(h.balance("proxy", &weth()).await, 11_000);
    assert_eq!(h.balance("ref-a", &weth()).await, 30);
    assert_eq!(h.balance("ref-b", &weth()).await, 18);
}

#[tokio::test]
async fn test_approval_is_reset_after_forwarding() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), ONE_ETHER).await;

    h.controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(ONE_ETHER, 0))
        .await
        .unwrap();

    let allowance = h
        .ledger
        .allowance(&addr("proxy"), &addr("approver"), &weth())
        .await
        .unwrap();
    assert_eq!(allowance, 0);
}

#[tokio::test]
async fn test_session_record_reaches_settled() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 1_000).await;

    let settlement = h
        .controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(1_000, 0))
        .await
        .unwrap();

    let record = h.controller.session(settlement.session).await.unwrap();
    assert_eq!(record.state, SwapState::Settled);
    assert_eq!(record.taken, 1_000);
    assert_eq!(record.held, 0);
}

#[tokio::test]
async fn test_native_payment_with_native_commission() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &Token::Native, 1_000).await;

    let swap = TokenSwap {
        from_token: Token::Native,
        is_native_commission: true,
        ..weth_to_usdc(1_000, 2_976)
    };
    let settlement = h
        .controller
        .perform_token_swap(&addr("alice"), swap)
        .await
        .unwrap();

    assert_eq!(settlement.output, 2_976);
    assert_eq!(h.balance("ref-a", &Token::Native).await, 5);
    assert_eq!(h.balance("ref-b", &Token::Native).await, 3);
    assert_eq!(h.balance("router", &Token::Native).await, 992);
    assert_eq!(h.balance("alice", &usdc()).await, 2_976);
}

#[tokio::test]
async fn test_native_commission_flag_on_token_payment_fails() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 1_000).await;

    let swap = TokenSwap {
        is_native_commission: true,
        ..weth_to_usdc(1_000, 0)
    };
    let result = h.controller.perform_token_swap(&addr("alice"), swap).await;

    assert!(matches!(
        result,
        Err(SwapError::CommissionTransferFailed { .. })
    ));
    assert_eq!(h.custody("alice", &weth()).await, 1_000);
}

#[tokio::test]
async fn test_native_payment_without_native_commission_flag_fails() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &Token::Native, 1_000).await;

    let swap = TokenSwap {
        from_token: Token::Native,
        ..weth_to_usdc(1_000, 0)
    };
    let result = h.controller.perform_token_swap(&addr("alice"), swap).await;

    assert!(matches!(
        result,
        Err(SwapError::CommissionTransferFailed { .. })
    ));
    assert_eq!(h.custody("alice", &Token::Native).await, 1_000);
    assert_eq!(h.balance("proxy", &Token::Native).await, 1_000);
    assert_eq!(h.balance("ref-a", &Token::Native).await, 0);
    assert_eq!(h.balance("ref-b", &Token::Native).await, 0);
    assert_eq!(h.balance("router", &Token::Native).await, 0);
    assert_eq!(h.balance("alice", &usdc()).await, 0);
}

#[tokio::test]
async fn test_zero_gross_is_rejected_before_any_transfer() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 1_000).await;

    let result = h
        .controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(0, 0))
        .await;

    assert!(matches!(result, Err(SwapError::InvalidAmount(_))));
    assert_eq!(h.balance("proxy", &weth()).await, 1_000);
}

#[tokio::test]
async fn test_swapping_more_than_deposited_fails() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 1_000).await;
    h.fund_and_deposit("bob", &weth(), 5_000).await;

    // the controller holds enough in total, but not on alice's behalf
    let result = h
        .controller
        .perform_token_swap(&addr("alice"), weth_to_usdc(2_000, 0))
        .await;

    assert!(matches!(
        result,
        Err(SwapError::InsufficientCustody {
            available: 1_000,
            required: 2_000,
            ..
        })
    ));
    assert_eq!(h.custody("alice", &weth()).await, 1_000);
    assert_eq!(h.custody("bob", &weth()).await, 5_000);
}

#[tokio::test]
async fn test_deposit_and_withdraw() {
    let h = fixed_rate_harness().await;
    h.fund_and_deposit("alice", &weth(), 1_000).await;

    h.controller
        .withdraw(&addr("alice"), &weth(), 400)
        .await
        .unwrap();
    assert_eq!(h.custody("alice", &weth()).await, 600);
    assert_eq!(h.balance("alice", &weth()).await, 400);

    let over = h.controller.withdraw(&addr("alice"), &weth(), 601).await;
    assert!(matches!(over, Err(SwapError::InsufficientCustody { .. })));

    let zero = h.controller.deposit(&addr("alice"), &weth(), 0).await;
    assert!(matches!(zero, Err(SwapError::InvalidAmount(_))));
}

#[tokio::test]
async fn test_deposit_without_funds_books_nothing() {
    let h = fixed_rate_harness().await;

    let result = h.controller.deposit(&addr("alice"), &weth(), 10).await;

    assert!(matches!(result, Err(SwapError::Ledger(_))));
    assert_eq!(h.custody("alice", &weth()).await, 0);
}

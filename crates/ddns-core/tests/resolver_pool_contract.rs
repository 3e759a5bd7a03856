//! Contract Test: Resolver Pool
//!
//! Constraints verified:
//! - The server set is built lazily and refreshed only once it has expired
//! - A refresh expires at the earliest expiry among its bootstrap answers
//! - A failing bootstrap host does not prevent the others from contributing
//! - A refresh that yields no servers fails and keeps the previous set
//! - A bootstrap answer with no addresses contributes neither servers nor expiry
//! - Discovery results are sorted and deduplicated as strings

mod common;

use common::*;
use ddns_core::ResolverPool;
use std::time::Duration;

fn pool_with(clock: &MockClock, client: &ScriptedDnsClient, hosts: &[&str]) -> ResolverPool {
    ResolverPool::with_clock(
        hosts.iter().copied(),
        Box::new(client.clone()),
        Box::new(clock.clone()),
    )
}

#[tokio::test]
async fn first_resolve_builds_server_set_with_minimum_expiry() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 300);
    client.answer_bootstrap("ns2.test", &[ip(192, 0, 2, 2)], 60);
    client.answer_bootstrap("ns3.test", &[ip(192, 0, 2, 3)], 900);
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test", "ns2.test", "ns3.test"]);
    let start = ddns_core::Clock::now(&clock);

    let addresses = pool.resolve("myip.test").await.unwrap();
    assert_eq!(addresses.values(), ["203.0.113.7"]);

    let set = pool.server_set().expect("server set committed");
    assert_eq!(
        set.servers(),
        [ip(192, 0, 2, 1), ip(192, 0, 2, 2), ip(192, 0, 2, 3)]
    );
    assert_eq!(
        set.expires_at(),
        start + Duration::from_secs(60),
        "expiry must be the minimum of all bootstrap expirations"
    );
    assert_eq!(client.last_servers(), set.servers());
}

#[tokio::test]
async fn server_set_is_reused_until_it_expires() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 120);
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test"]);

    pool.resolve("myip.test").await.unwrap();
    assert_eq!(client.bootstrap_calls(), 1);

    clock.advance(Duration::from_secs(119));
    pool.resolve("myip.test").await.unwrap();
    assert_eq!(client.bootstrap_calls(), 1, "still fresh, no refresh");

    // now == expires_at counts as expired
    clock.advance(Duration::from_secs(1));
    pool.resolve("myip.test").await.unwrap();
    assert_eq!(client.bootstrap_calls(), 2);
    assert_eq!(client.discovery_calls(), 3);
}

#[tokio::test]
async fn failed_bootstrap_host_does_not_abort_refresh() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.fail_bootstrap("ns1.test");
    client.answer_bootstrap("ns2.test", &[ip(192, 0, 2, 2)], 300);
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test", "ns2.test"]);

    pool.resolve("myip.test").await.unwrap();
    assert_eq!(client.bootstrap_calls(), 2);
    assert_eq!(pool.server_set().unwrap().servers(), [ip(192, 0, 2, 2)]);
}

#[tokio::test]
async fn all_bootstrap_failures_surface_an_error_and_keep_previous_set() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 60);
    client.answer_bootstrap("ns2.test", &[ip(192, 0, 2, 2)], 60);
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test", "ns2.test"]);
    pool.resolve("myip.test").await.unwrap();
    let before = pool.server_set().cloned().unwrap();

    clock.advance(Duration::from_secs(61));
    client.fail_bootstrap("ns1.test");
    client.fail_bootstrap("ns2.test");

    let err = pool.resolve("myip.test").await.unwrap_err();
    assert!(err.is_resolution());
    assert!(
        err.to_string().contains("ns2.test"),
        "the last lookup error is surfaced: {err}"
    );
    assert_eq!(pool.server_set(), Some(&before), "previous set untouched");
    assert_eq!(client.discovery_calls(), 1, "no query without servers");

    // The stale set is not reused: the next call retries the refresh
    pool.resolve("myip.test").await.unwrap_err();
    assert_eq!(client.bootstrap_calls(), 6);
}

#[tokio::test]
async fn no_server_set_on_first_failure() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.fail_bootstrap("ns1.test");
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test"]);

    assert!(pool.resolve("myip.test").await.is_err());
    assert!(pool.server_set().is_none());
    assert_eq!(client.discovery_calls(), 0);
}

#[tokio::test]
async fn discovery_failure_is_a_resolution_error() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 60);
    client.fail_discovery();

    let mut pool = pool_with(&clock, &client, &["ns1.test"]);

    let err = pool.resolve("myip.test").await.unwrap_err();
    assert!(err.is_resolution());
    assert!(pool.server_set().is_some(), "refresh itself succeeded");
}

#[tokio::test]
async fn empty_discovery_answer_is_an_error() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 60);
    client.answer_discovery(&[]);

    let mut pool = pool_with(&clock, &client, &["ns1.test"]);

    assert!(pool.resolve("myip.test").await.unwrap_err().is_resolution());
}

#[tokio::test]
async fn discovered_addresses_are_sorted_as_strings() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[ip(192, 0, 2, 1)], 60);
    client.answer_discovery(&[ip(10, 0, 0, 9), ip(10, 0, 0, 10), ip(10, 0, 0, 9)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test"]);

    let addresses = pool.resolve("myip.test").await.unwrap();
    assert_eq!(addresses.values(), ["10.0.0.10", "10.0.0.9"]);
}

#[tokio::test]
async fn empty_bootstrap_answer_does_not_shorten_expiry() {
    let clock = MockClock::new();
    let client = ScriptedDnsClient::new(clock.clone());
    client.answer_bootstrap("ns1.test", &[], 1);
    client.answer_bootstrap("ns2.test", &[ip(192, 0, 2, 2)], 300);
    client.answer_discovery(&[ip(203, 0, 113, 7)]);

    let mut pool = pool_with(&clock, &client, &["ns1.test", "ns2.test"]);
    let start = ddns_core::Clock::now(&clock);

    pool.resolve("myip.test").await.unwrap();
    let set = pool.server_set().unwrap();
    assert_eq!(set.servers(), [ip(192, 0, 2, 2)]);
    assert_eq!(set.expires_at(), start + Duration::from_secs(300));

    // The empty answer's expiry has passed; the set is still fresh
    clock.advance(Duration::from_secs(2));
    pool.resolve("myip.test").await.unwrap();
    assert_eq!(client.bootstrap_calls(), 2);
}

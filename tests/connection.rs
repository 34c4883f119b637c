#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use std::time::Duration;

use garden_stock_feed::error::Kind;
use garden_stock_feed::ws::{
    CloseReason, ConnectionConfig, ConnectionState, Listeners, ReconnectingConnection,
};
use tokio::time::{Instant, sleep, timeout};

use crate::common::{MockWsServer, PingMode, Recorder, eventually, unreachable_endpoint};

const WAIT: Duration = Duration::from_secs(3);

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

async fn wait_open(connection: &ReconnectingConnection) {
    let mut state = connection.state_receiver();
    timeout(WAIT, state.wait_for(|state| state.is_open()))
        .await
        .expect("connection should open")
        .unwrap();
}

async fn join(connection: &ReconnectingConnection) {
    timeout(WAIT, connection.join())
        .await
        .expect("connection task should finish");
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn open_should_forward_messages() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let opened = Recorder::default();
        let messages = Recorder::default();

        let listeners = Listeners::default()
            .on_open({
                let opened = opened.clone();
                move || opened.push(())
            })
            .on_message({
                let messages = messages.clone();
                move |text| messages.push(text.to_owned())
            });
        let config = ConnectionConfig::builder().endpoint(server.ws_url()).build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        wait_open(&connection).await;
        assert_eq!(opened.len(), 1);
        assert_eq!(connection.retries(), 0);
        assert_eq!(connection.attempts(), 1);

        let payload = r#"{"data":{"seeds":[{"name":"Carrot","quantity":12}]}}"#;
        server.send(payload);

        assert!(eventually(WAIT, || messages.len() == 1).await);
        assert_eq!(messages.events(), [payload]);

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn send_should_only_queue_while_open() {
        let mut server = MockWsServer::start(PingMode::Echo).await;
        let config = ConnectionConfig::builder().endpoint(server.ws_url()).build();
        let connection = ReconnectingConnection::open(config).unwrap();

        // The connection task has not run yet.
        assert_eq!(connection.state(), ConnectionState::Connecting);
        assert!(!connection.send("too early"));

        wait_open(&connection).await;
        assert!(connection.send("hello"));
        assert_eq!(server.recv().await.as_deref(), Some("hello"));

        connection.close();
        join(&connection).await;
        assert!(!connection.send("too late"));
    }

    #[tokio::test]
    async fn registering_listener_should_replace_previous() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let config = ConnectionConfig::builder().endpoint(server.ws_url()).build();
        let connection = ReconnectingConnection::open(config).unwrap();

        let first = Recorder::default();
        let second = Recorder::default();
        connection.on_message({
            let first = first.clone();
            move |text| first.push(text.to_owned())
        });
        connection.on_message({
            let second = second.clone();
            move |text| second.push(text.to_owned())
        });

        wait_open(&connection).await;
        server.send("snapshot");

        assert!(eventually(WAIT, || second.len() == 1).await);
        assert_eq!(first.len(), 0);

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn invalid_endpoint_should_fail() {
        let config = ConnectionConfig::builder()
            .endpoint("https://ws.growagardenpro.com/")
            .build();

        let error = ReconnectingConnection::open(config).unwrap_err();

        assert_eq!(error.kind(), Kind::Validation);
    }

    #[tokio::test]
    async fn zero_heartbeat_interval_should_fail() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .heartbeat_interval(Duration::ZERO)
            .build();

        let error = ReconnectingConnection::open(config).unwrap_err();

        assert_eq!(error.kind(), Kind::Validation);
        sleep(ms(100)).await;
        assert_eq!(server.connections(), 0);
    }

    #[tokio::test]
    async fn oversized_durations_should_not_stall_connection() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(20))
            .heartbeat_interval(Duration::MAX)
            .heartbeat_timeout(Duration::MAX)
            .build();
        let connection = ReconnectingConnection::open(config).unwrap();

        wait_open(&connection).await;
        server.disconnect_all();

        assert!(eventually(WAIT, || server.connections() == 2).await);
        wait_open(&connection).await;

        connection.close();
        join(&connection).await;
    }
}

mod heartbeat {
    use super::*;

    #[tokio::test]
    async fn reply_should_be_consumed_and_keep_connection() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let messages = Recorder::default();
        let closes = Recorder::default();

        let listeners = Listeners::default()
            .on_message({
                let messages = messages.clone();
                move |text| messages.push(text.to_owned())
            })
            .on_close({
                let closes = closes.clone();
                move |reason| closes.push(reason.clone())
            });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .heartbeat_interval(ms(50))
            .heartbeat_timeout(ms(200))
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        wait_open(&connection).await;
        assert!(eventually(WAIT, || server.pings() >= 4).await);

        assert_eq!(messages.len(), 0, "heartbeat replies must not reach on_message");
        assert_eq!(closes.len(), 0);
        assert_eq!(server.connections(), 1);
        assert!(connection.state().is_open());

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn missing_reply_should_force_reconnect() {
        let server = MockWsServer::start(PingMode::Silent).await;
        let opened = Recorder::default();
        let closes = Recorder::default();

        let listeners = Listeners::default()
            .on_open({
                let opened = opened.clone();
                move || opened.push(Instant::now())
            })
            .on_close({
                let closes = closes.clone();
                move |reason| closes.push((Instant::now(), reason.clone()))
            });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(50))
            .heartbeat_interval(ms(100))
            .heartbeat_timeout(ms(50))
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        assert!(eventually(WAIT, || closes.len() >= 1).await);
        let (closed_at, reason) = closes.events()[0].clone();
        let opened_at = opened.events()[0];
        assert_eq!(reason, CloseReason::HeartbeatTimeout);

        // First ping after one interval, close once the timeout lapses.
        let elapsed = closed_at - opened_at;
        assert!(elapsed >= ms(145), "closed too early: {elapsed:?}");
        assert!(elapsed < ms(1_000), "closed too late: {elapsed:?}");

        assert!(eventually(WAIT, || opened.len() >= 2).await);
        assert!(server.connections() >= 2);
        assert_eq!(connection.retries(), 0);

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn advisory_pings_should_never_time_out() {
        let server = MockWsServer::start(PingMode::Silent).await;
        let closes = Recorder::default();

        let listeners = Listeners::default().on_close({
            let closes = closes.clone();
            move |reason| closes.push(reason.clone())
        });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .heartbeat_interval(ms(40))
            .heartbeat_timeout(ms(10))
            .expect_pong(false)
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        wait_open(&connection).await;
        assert!(eventually(WAIT, || server.pings() >= 5).await);

        assert_eq!(closes.len(), 0);
        assert_eq!(server.connections(), 1);
        assert!(connection.state().is_open());

        connection.close();
        join(&connection).await;
    }
}

mod reconnect {
    use super::*;

    #[tokio::test]
    async fn peer_close_should_reconnect_and_reset_retries() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let closes = Recorder::default();

        let listeners = Listeners::default().on_close({
            let closes = closes.clone();
            move |reason| closes.push(reason.clone())
        });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(50))
            .max_retries(3)
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        for round in 1..=3 {
            assert!(eventually(WAIT, || server.connections() == round).await);
            wait_open(&connection).await;
            server.disconnect_all();
            assert!(eventually(WAIT, || closes.len() == round).await);
        }

        // More forced disconnects than max retries: each successful open resets the counter.
        assert!(eventually(WAIT, || server.connections() == 4).await);
        wait_open(&connection).await;
        assert_eq!(connection.retries(), 0);
        assert_eq!(
            closes.events()[0],
            CloseReason::Remote {
                code: Some(1000),
                reason: "bye".to_owned(),
            }
        );

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn transport_error_should_report_close_and_reconnect() {
        #[derive(Debug, Clone, PartialEq)]
        enum Event {
            Open,
            Error,
            Close(CloseReason),
        }

        let server = MockWsServer::start(PingMode::Echo).await;
        let events = Recorder::default();

        let listeners = Listeners::default()
            .on_open({
                let events = events.clone();
                move || events.push(Event::Open)
            })
            .on_error({
                let events = events.clone();
                move |_| events.push(Event::Error)
            })
            .on_close({
                let events = events.clone();
                move |reason| events.push(Event::Close(reason.clone()))
            });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(50))
            .max_retries(1)
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        wait_open(&connection).await;
        server.drop_all();

        assert!(eventually(WAIT, || events.len() >= 4).await);
        assert_eq!(
            events.events()[..4],
            [
                Event::Open,
                Event::Error,
                Event::Close(CloseReason::Error),
                Event::Open,
            ]
        );
        assert_eq!(server.connections(), 2);
        wait_open(&connection).await;
        assert_eq!(connection.retries(), 0);

        connection.close();
        join(&connection).await;
    }

    #[tokio::test]
    async fn exhausted_retries_should_stop_for_good() {
        let endpoint = unreachable_endpoint().await;
        let errors = Recorder::default();
        let closes = Recorder::default();

        let listeners = Listeners::default()
            .on_error({
                let errors = errors.clone();
                move |error| errors.push(error.to_string())
            })
            .on_close({
                let closes = closes.clone();
                move |reason| closes.push(reason.clone())
            });
        let config = ConnectionConfig::builder()
            .endpoint(endpoint)
            .reconnect_interval(ms(20))
            .max_retries(2)
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        join(&connection).await;

        assert_eq!(connection.attempts(), 3);
        assert_eq!(connection.retries(), 2);
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(errors.len(), 3);
        assert_eq!(closes.events(), vec![CloseReason::Error; 3]);

        sleep(ms(200)).await;
        assert_eq!(connection.attempts(), 3);
    }
}

mod close {
    use super::*;

    #[tokio::test]
    async fn close_should_be_terminal_and_idempotent() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let closes = Recorder::default();

        let listeners = Listeners::default().on_close({
            let closes = closes.clone();
            move |reason| closes.push(reason.clone())
        });
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(20))
            .heartbeat_interval(ms(30))
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        wait_open(&connection).await;
        connection.close();
        connection.close();
        join(&connection).await;
        connection.close();

        assert!(connection.is_closed());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(closes.events(), [CloseReason::Requested]);
        assert!(eventually(WAIT, || server.closed() == 1).await);

        sleep(ms(200)).await;
        assert_eq!(server.connections(), 1);
        assert_eq!(connection.attempts(), 1);
    }

    #[tokio::test]
    async fn close_should_cancel_pending_reconnect() {
        let endpoint = unreachable_endpoint().await;
        let closes = Recorder::default();

        let listeners = Listeners::default().on_close({
            let closes = closes.clone();
            move |reason| closes.push(reason.clone())
        });
        let config = ConnectionConfig::builder()
            .endpoint(endpoint)
            .reconnect_interval(Duration::from_secs(60))
            .build();
        let connection = ReconnectingConnection::open_with_listeners(config, listeners).unwrap();

        assert!(eventually(WAIT, || closes.len() == 1).await);
        connection.close();
        join(&connection).await;

        assert_eq!(connection.attempts(), 1);
        assert_eq!(closes.events(), [CloseReason::Error]);
    }

    #[tokio::test]
    async fn dropping_last_handle_should_close() {
        let server = MockWsServer::start(PingMode::Echo).await;
        let config = ConnectionConfig::builder()
            .endpoint(server.ws_url())
            .reconnect_interval(ms(20))
            .build();
        let connection = ReconnectingConnection::open(config).unwrap();

        wait_open(&connection).await;
        let clone = connection.clone();
        drop(connection);
        assert!(clone.state().is_open());

        drop(clone);
        assert!(eventually(WAIT, || server.closed() == 1).await);

        sleep(ms(200)).await;
        assert_eq!(server.connections(), 1);
    }
}

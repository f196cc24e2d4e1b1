use core::net::SocketAddr;

use embassy_futures::select::{Either, Either3, select, select3};
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Instant, Timer};
use embedded_io_async::Write;
use myrtio_ota::SessionId;
use myrtio_ota::engine::ports::TransportEvents;

use super::{DRIVER_WAKE, NetCommand, with_engine};
use crate::infrastructure::drivers::{resolve_host, to_core_ip, to_endpoint};

const RX_BUFFER_SIZE: usize = 4096;
const TX_BUFFER_SIZE: usize = 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Executes the socket work queued by the engine and reports the results.
///
/// Only one connection exists at a time, matching the single update session.
#[embassy_executor::task]
pub(crate) async fn ota_driver_task(stack: Stack<'static>) {
    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];

    loop {
        match next_command().await {
            NetCommand::Resolve(session, host) => {
                let address = resolve_host(stack, host.as_str())
                    .await
                    .ok()
                    .and_then(to_core_ip);
                with_engine(|engine| engine.on_resolved(session, address));
            }
            NetCommand::Connect(session, remote) => {
                let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
                run_connection(&mut socket, session, remote).await;
                socket.abort();
                // Ignored by the engine when the session already finished
                with_engine(|engine| engine.on_disconnected(session));
            }
            // Left over from a connection that is already gone
            command @ (NetCommand::Send(..) | NetCommand::Disconnect(_)) => {
                log::debug!("ota: dropping {:?}", command);
            }
        }
    }
}

async fn next_command() -> NetCommand {
    loop {
        if let Some(command) = pop_command() {
            return command;
        }
        DRIVER_WAKE.wait().await;
    }
}

fn pop_command() -> Option<NetCommand> {
    with_engine(|engine| engine.network_mut().pop_command()).flatten()
}

async fn run_connection(socket: &mut TcpSocket<'_>, session: SessionId, remote: SocketAddr) {
    let Some(endpoint) = to_endpoint(remote) else {
        with_engine(|engine| engine.on_error(session));
        return;
    };

    let connected = select(socket.connect(endpoint), wait_deadline()).await;
    match connected {
        Either::First(Ok(())) => {
            with_engine(|engine| {
                engine.network_mut().set_readable(true);
                engine.on_connected(session);
            });
        }
        Either::First(Err(e)) => {
            log::warn!("ota: connect failed: {:?}", e);
            with_engine(|engine| engine.on_error(session));
            return;
        }
        Either::Second(()) => {
            fire_timeout();
            return;
        }
    }

    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        while let Some(command) = pop_command() {
            match command {
                NetCommand::Send(id, data) if id == session => {
                    if let Err(e) = socket.write_all(&data).await {
                        log::warn!("ota: send failed: {:?}", e);
                        with_engine(|engine| engine.on_error(session));
                    }
                }
                NetCommand::Disconnect(id) if id == session => {
                    socket.close();
                    return;
                }
                other => log::debug!("ota: dropping {:?}", other),
            }
        }
        if with_engine(|engine| engine.session_id()).flatten() != Some(session) {
            return;
        }

        let event = select3(socket.read(&mut buffer), wait_deadline(), DRIVER_WAKE.wait()).await;
        match event {
            Either3::First(Ok(0)) => return,
            Either3::First(Ok(n)) => {
                let readable = socket.may_recv();
                with_engine(|engine| {
                    engine.network_mut().set_readable(readable);
                    engine.on_data(session, &buffer[..n]);
                });
            }
            Either3::First(Err(e)) => {
                log::warn!("ota: receive failed: {:?}", e);
                with_engine(|engine| engine.on_error(session));
            }
            Either3::Second(()) => fire_timeout(),
            Either3::Third(()) => {}
        }
    }
}

/// Sleeps until the armed deadline, forever when none is armed.
async fn wait_deadline() {
    let deadline = with_engine(|engine| engine.timer().deadline()).flatten();
    Timer::at(deadline.map_or(Instant::MAX, |(_, _, at)| at)).await;
}

fn fire_timeout() {
    with_engine(|engine| {
        if let Some((session, kind, at)) = engine.timer().deadline() {
            if at <= Instant::now() {
                engine.on_timeout(session, kind);
            }
        }
    });
}

//! Remote trigger listener
//!
//! Accepts TCP connections carrying one topic name per line (`esp/update` or
//! `esp/revert`) and answers each line with `OK` or `ERR`.

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;
use heapless::Vec;
use myrtio_ota::TriggerCommand;

use crate::config::TRIGGER_PORT;
use crate::controllers::handle_trigger;

const RX_BUFFER_SIZE: usize = 256;
const TX_BUFFER_SIZE: usize = 64;
const MAX_LINE_LEN: usize = 64;

#[derive(Debug)]
enum ListenerError {
    Accept,
    Read,
    Write,
}

#[embassy_executor::task]
pub(crate) async fn trigger_listener_task(stack: Stack<'static>) {
    log::info!("trigger: listening on port {}", TRIGGER_PORT);

    loop {
        if let Err(e) = handle_connection(stack).await {
            log::warn!("trigger: connection error: {:?}", e);
        }
        // Small delay before accepting next connection
        Timer::after(Duration::from_millis(100)).await;
    }
}

async fn handle_connection(stack: Stack<'static>) -> Result<(), ListenerError> {
    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];

    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(30)));
    socket
        .accept(TRIGGER_PORT)
        .await
        .map_err(|_| ListenerError::Accept)?;
    log::info!("trigger: connection accepted");

    let mut line = Vec::<u8, MAX_LINE_LEN>::new();
    let mut chunk = [0u8; 32];
    loop {
        let n = socket.read(&mut chunk).await.map_err(|_| ListenerError::Read)?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte != b'\n' {
                // Overlong lines are truncated and then fail to parse
                let _ = line.push(byte);
                continue;
            }
            let reply: &[u8] = if dispatch(&line) { b"OK\n" } else { b"ERR\n" };
            line.clear();
            socket
                .write_all(reply)
                .await
                .map_err(|_| ListenerError::Write)?;
        }
    }

    socket.close();
    Ok(())
}

fn dispatch(line: &[u8]) -> bool {
    let Some(command) = core::str::from_utf8(line)
        .ok()
        .and_then(TriggerCommand::from_topic)
    else {
        log::warn!("trigger: unknown topic");
        return false;
    };
    log::info!("trigger: {}", command.topic());
    handle_trigger(command).is_ok()
}

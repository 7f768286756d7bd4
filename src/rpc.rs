//! Vendor command channel
//!
//! The controller exposes one RPC per hardware setting or motion primitive,
//! each answering with an integer status code (0 = success). This module
//! defines that boundary as the [`CommandPort`] trait and provides the
//! line-oriented TCP client used against real hardware. Nothing here
//! interprets a nonzero code beyond "the command failed".

use crate::state::{CartesianVector, CoordinateSystem};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use tracing::warn;

/// Status code reported when the command socket itself fails; downstream
/// treats it like any other hardware fault.
pub const IO_FAILURE: i32 = -1;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// One linear move request.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearMove {
    pub pose: CartesianVector,
    pub velocity: f64,
    pub acceleration: f64,
    pub blend_radius: f64,
    /// Offset move: reference frame plus the offset itself. `None` moves to
    /// `pose` absolutely.
    pub offset: Option<(CoordinateSystem, CartesianVector)>,
}

/// The hardware command surface, one method per controller RPC.
pub trait CommandPort: Send {
    fn move_l(&mut self, mv: &LinearMove) -> i32;
    fn pause_motion(&mut self) -> i32;
    fn resume_motion(&mut self) -> i32;
    fn stop_motion(&mut self) -> i32;
    fn set_sample_period(&mut self, period_ms: f64) -> i32;
    fn set_tool_coord(&mut self, id: i32, offset: &CartesianVector) -> i32;
    fn set_anticollision(&mut self, mode: i32, level: &[f64; 6], config_slot: i32) -> i32;
    fn set_collision_strategy(&mut self, strategy: i32) -> i32;
    fn custom_collision_start(
        &mut self,
        kind: i32,
        joint_thresholds: &[f64; 6],
        cartesian_thresholds: &[f64; 6],
        mode: i32,
    ) -> i32;
    fn custom_collision_end(&mut self) -> i32;
    fn set_digital_output(&mut self, id: u8, value: u8) -> i32;
    fn set_tool_digital_output(&mut self, id: u8, value: u8) -> i32;
    fn acc_smooth_start(&mut self, mode: i32) -> i32;
    fn set_speed(&mut self, percent: i32) -> i32;
    fn set_acc_scale(&mut self, percent: i32) -> i32;
    fn reset_all_error(&mut self) -> i32;
    fn set_mode(&mut self, mode: i32) -> i32;
    fn drag_teach_switch(&mut self, enable: bool) -> i32;
}

/// TCP command client.
///
/// Each call writes one request line (`Name(arg,arg,...)`) and reads one
/// reply line of the form `ret: <code>`.
pub struct TcpCommandPort {
    socket: TcpStream,
    reply_pattern: Regex,
}

impl TcpCommandPort {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let socket = TcpStream::connect((host, port))
            .with_context(|| format!("Failed to connect to {}:{}", host, port))?;

        // A read timeout keeps a halted controller from hanging callers
        socket
            .set_read_timeout(Some(REPLY_TIMEOUT))
            .context("Failed to set socket read timeout")?;

        let reply_pattern = Regex::new(r"(\w+):\s*(-?\d+)")?;

        Ok(Self {
            socket,
            reply_pattern,
        })
    }

    fn call(&mut self, request: String) -> i32 {
        if let Err(e) = self.socket.write_all(request.as_bytes()) {
            warn!("failed to send command: {}", e);
            return IO_FAILURE;
        }

        match self.read_reply() {
            Ok(code) => code,
            Err(e) => {
                warn!("failed to read command reply: {}", e);
                IO_FAILURE
            }
        }
    }

    /// Read one reply line and extract the status code.
    fn read_reply(&mut self) -> Result<i32> {
        let mut collected = Vec::new();
        let mut buffer = [0u8; 1];

        loop {
            self.socket
                .read_exact(&mut buffer)
                .context("Failed to read from command socket")?;
            if buffer[0] == b'\n' {
                break;
            }
            collected.push(buffer[0]);
        }

        let raw = String::from_utf8(collected).context("Invalid UTF-8 in command reply")?;
        let captures = self
            .reply_pattern
            .captures(&raw)
            .ok_or_else(|| anyhow!("Invalid command reply format: {}", raw))?;

        captures
            .get(2)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .ok_or_else(|| anyhow!("Missing status code in reply: {}", raw))
    }
}

fn join(values: &[f64; 6]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl CommandPort for TcpCommandPort {
    fn move_l(&mut self, mv: &LinearMove) -> i32 {
        let request = match &mv.offset {
            Some((frame, offset)) => format!(
                "MoveL({},{},{},{},{},{})\n",
                join(&mv.pose.to_array()),
                mv.velocity,
                mv.acceleration,
                mv.blend_radius,
                frame.code(),
                join(&offset.to_array()),
            ),
            None => format!(
                "MoveL({},{},{},{},0)\n",
                join(&mv.pose.to_array()),
                mv.velocity,
                mv.acceleration,
                mv.blend_radius,
            ),
        };
        self.call(request)
    }

    fn pause_motion(&mut self) -> i32 {
        self.call("PauseMotion()\n".to_string())
    }

    fn resume_motion(&mut self) -> i32 {
        self.call("ResumeMotion()\n".to_string())
    }

    fn stop_motion(&mut self) -> i32 {
        self.call("StopMotion()\n".to_string())
    }

    fn set_sample_period(&mut self, period_ms: f64) -> i32 {
        self.call(format!("SetStateSamplePeriod({})\n", period_ms))
    }

    fn set_tool_coord(&mut self, id: i32, offset: &CartesianVector) -> i32 {
        self.call(format!(
            "SetToolCoord({},{},0,0,0,0)\n",
            id,
            join(&offset.to_array())
        ))
    }

    fn set_anticollision(&mut self, mode: i32, level: &[f64; 6], config_slot: i32) -> i32 {
        self.call(format!(
            "SetAnticollision({},{},{})\n",
            mode,
            join(level),
            config_slot
        ))
    }

    fn set_collision_strategy(&mut self, strategy: i32) -> i32 {
        self.call(format!("SetCollisionStrategy({})\n", strategy))
    }

    fn custom_collision_start(
        &mut self,
        kind: i32,
        joint_thresholds: &[f64; 6],
        cartesian_thresholds: &[f64; 6],
        mode: i32,
    ) -> i32 {
        self.call(format!(
            "CustomCollisionDetectionStart({},{},{},{})\n",
            kind,
            join(joint_thresholds),
            join(cartesian_thresholds),
            mode
        ))
    }

    fn custom_collision_end(&mut self) -> i32 {
        self.call("CustomCollisionDetectionEnd()\n".to_string())
    }

    fn set_digital_output(&mut self, id: u8, value: u8) -> i32 {
        self.call(format!("SetDO({},{})\n", id, value))
    }

    fn set_tool_digital_output(&mut self, id: u8, value: u8) -> i32 {
        self.call(format!("SetToolDO({},{})\n", id, value))
    }

    fn acc_smooth_start(&mut self, mode: i32) -> i32 {
        self.call(format!("AccSmoothStart({})\n", mode))
    }

    fn set_speed(&mut self, percent: i32) -> i32 {
        self.call(format!("SetSpeed({})\n", percent))
    }

    fn set_acc_scale(&mut self, percent: i32) -> i32 {
        self.call(format!("SetOaccScale({})\n", percent))
    }

    fn reset_all_error(&mut self) -> i32 {
        self.call("ResetAllError()\n".to_string())
    }

    fn set_mode(&mut self, mode: i32) -> i32 {
        self.call(format!("Mode({})\n", mode))
    }

    fn drag_teach_switch(&mut self, enable: bool) -> i32 {
        self.call(format!("DragTeachSwitch({})\n", enable as i32))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Minimal controller stand-in: replies `ret: 0` to every request and
    /// records what it was asked.
    fn spawn_echo_server(replies: usize) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut stream = stream;
            let mut requests = Vec::new();
            for _ in 0..replies {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                requests.push(line.trim_end().to_string());
                stream.write_all(b"ret: 0\n").unwrap();
            }
            requests
        });

        (port, handle)
    }

    #[test]
    fn test_request_reply_cycle() {
        let (port, server) = spawn_echo_server(3);
        let mut client = TcpCommandPort::connect("127.0.0.1", port).unwrap();

        assert_eq!(client.pause_motion(), 0);
        assert_eq!(client.set_speed(100), 0);
        assert_eq!(client.drag_teach_switch(true), 0);

        let requests = server.join().unwrap();
        assert_eq!(requests[0], "PauseMotion()");
        assert_eq!(requests[1], "SetSpeed(100)");
        assert_eq!(requests[2], "DragTeachSwitch(1)");
    }

    #[test]
    fn test_nonzero_code_passes_through() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            stream.write_all(b"ret: 112\n").unwrap();
        });

        let mut client = TcpCommandPort::connect("127.0.0.1", port).unwrap();
        assert_eq!(client.stop_motion(), 112);
        server.join().unwrap();
    }

    #[test]
    fn test_closed_socket_reports_io_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = TcpCommandPort::connect("127.0.0.1", port).unwrap();
        server.join().unwrap();
        assert_eq!(client.reset_all_error(), IO_FAILURE);
    }
}

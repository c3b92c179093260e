//! Scripted in-memory server for driving a real `GbxClient`.

#![allow(dead_code)]

use std::collections::VecDeque;

use gbxremote::codec::xml::{
    parse_method_call, write_method_call, write_method_response, MethodCall, MethodResponse,
};
use gbxremote::protocol::handshake::encode_greeting;
use gbxremote::protocol::{build_frame, Frame, FrameBuffer, GREETING};
use gbxremote::{ClientBuilder, Fault, GbxClient, Value};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

pub struct MockServer {
    io: DuplexStream,
    buffer: FrameBuffer,
    queued: VecDeque<Frame>,
}

impl MockServer {
    /// Greet a fresh client with default settings.
    pub async fn start() -> (GbxClient, MockServer) {
        Self::start_with(GbxClient::builder()).await
    }

    pub async fn start_with(builder: ClientBuilder) -> (GbxClient, MockServer) {
        let (client_io, mut server_io) = duplex(256 * 1024);
        server_io
            .write_all(&encode_greeting(GREETING))
            .await
            .unwrap();
        let client = builder.from_stream(client_io).await.unwrap();
        let server = MockServer {
            io: server_io,
            buffer: FrameBuffer::new(),
            queued: VecDeque::new(),
        };
        (client, server)
    }

    /// Next frame the client wrote. Panics if the client hung up.
    pub async fn next_frame(&mut self) -> Frame {
        loop {
            if let Some(frame) = self.queued.pop_front() {
                return frame;
            }
            let mut buf = [0u8; 4096];
            let n = self.io.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed the connection");
            self.queued.extend(self.buffer.push(&buf[..n]).unwrap());
        }
    }

    /// Next call the client made, with its handle.
    pub async fn next_call(&mut self) -> (u32, MethodCall) {
        let frame = self.next_frame().await;
        let call = parse_method_call(frame.payload()).unwrap();
        (frame.handle(), call)
    }

    /// `true` once the client side of the stream is closed.
    pub async fn client_hung_up(&mut self) -> bool {
        let mut buf = [0u8; 4096];
        loop {
            match self.io.read(&mut buf).await {
                Ok(0) | Err(_) => return true,
                Ok(_) => continue,
            }
        }
    }

    pub async fn respond(&mut self, handle: u32, value: Value) {
        let xml = write_method_response(&MethodResponse::Success(value));
        self.send_raw(handle, xml.as_bytes()).await;
    }

    pub async fn fault(&mut self, handle: u32, code: i32, message: &str) {
        let fault = Fault::new(code, message).to_value().unwrap();
        let xml = write_method_response(&MethodResponse::Fault(fault));
        self.send_raw(handle, xml.as_bytes()).await;
    }

    /// Push a server callback. `handle` must have the high bit clear.
    pub async fn callback(&mut self, handle: u32, name: &str, params: Vec<Value>) {
        let xml = write_method_call(name, &params);
        self.send_raw(handle, xml.as_bytes()).await;
    }

    pub async fn send_raw(&mut self, handle: u32, payload: &[u8]) {
        self.io.write_all(&build_frame(handle, payload)).await.unwrap();
    }

    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.io.write_all(bytes).await.unwrap();
    }
}

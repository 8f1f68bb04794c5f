//! Scripted passive-mode FTP server serving a single file.
//!
//! Speaks just enough of the protocol for the fetcher's FTP transport and
//! records every command it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// The file the server exposes.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub body: Vec<u8>,
    /// `MDTM` answer (`YYYYMMDDHHMMSS`); `None` makes the server reject `MDTM`.
    pub mdtm: Option<&'static str>,
}

pub struct FtpFixture {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FtpFixture {
    pub async fn start(file: RemoteFile) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind control listener");
        let addr = listener.local_addr().expect("control address");
        let commands = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&commands);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let file = file.clone();
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = serve(stream, file, recorded).await;
                });
            }
        });

        Self {
            addr,
            commands,
            task,
        }
    }

    /// URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("ftp://{}{path}", self.addr)
    }

    /// Every command received so far, across connections.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }

    /// Received commands starting with `verb`.
    pub fn commands_named(&self, verb: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|command| command.split(' ').next() == Some(verb))
            .collect()
    }
}

impl Drop for FtpFixture {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    stream: TcpStream,
    file: RemoteFile,
    recorded: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut data_listener: Option<TcpListener> = None;
    let mut rest: usize = 0;

    writer
        .write_all(b"220-fixture FTP server\r\n220 ready\r\n")
        .await?;

    while let Some(line) = lines.next_line().await? {
        recorded.lock().expect("commands lock").push(line.clone());
        let (verb, argument) = line.split_once(' ').unwrap_or((line.as_str(), ""));

        let reply = match verb.to_ascii_uppercase().as_str() {
            "USER" => "331 password required".to_string(),
            "PASS" => "230 logged in".to_string(),
            "TYPE" => "200 type set".to_string(),
            "SIZE" if argument == file.path => format!("213 {}", file.body.len()),
            "MDTM" if argument == file.path => match file.mdtm {
                Some(stamp) => format!("213 {stamp}"),
                None => "502 MDTM not supported".to_string(),
            },
            "SIZE" | "MDTM" => "550 no such file".to_string(),
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                data_listener = Some(listener);
                format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port / 256,
                    port % 256
                )
            }
            "REST" => match argument.parse::<usize>() {
                Ok(offset) => {
                    rest = offset;
                    format!("350 restarting at {offset}")
                }
                Err(_) => "501 bad offset".to_string(),
            },
            "RETR" if argument != file.path => "550 no such file".to_string(),
            "RETR" => {
                let Some(listener) = data_listener.take() else {
                    writer.write_all(b"425 use PASV first\r\n").await?;
                    continue;
                };
                writer.write_all(b"150 opening data connection\r\n").await?;
                let (mut data, _) = listener.accept().await?;
                let start = rest.min(file.body.len());
                data.write_all(&file.body[start..]).await?;
                data.shutdown().await?;
                drop(data);
                rest = 0;
                "226 transfer complete".to_string()
            }
            "QUIT" => {
                writer.write_all(b"221 bye\r\n").await?;
                return Ok(());
            }
            _ => "502 command not implemented".to_string(),
        };
        writer.write_all(format!("{reply}\r\n").as_bytes()).await?;
    }
    Ok(())
}

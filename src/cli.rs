//! CLI utilities for the pubsubsql client.
//!
//! The utilities present in this module are used by the interactive client binary.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{
    ClientError, Command, CommandError,
    protocol::{Client, Transport},
};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Prompt user for a command.
///
/// End of input is treated as `.exit`.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CommandError>
where
    R: BufRead,
    W: Write,
{
    let input = |e: io::Error| CommandError::Input(e.to_string());

    write!(&mut writer, "> ").map_err(input)?;
    writer.flush().map_err(input)?;

    let mut s = String::default();
    if reader.read_line(&mut s).map_err(input)? == 0 {
        writeln!(&mut writer).map_err(input)?;
        return Ok(Command::Exit);
    }
    s.as_str().try_into()
}

/// Writes the current response of `client` as a tab separated table, walking every
/// remaining row. Returns the number of rows written.
pub fn write_result<T, W>(client: &mut Client<T>, mut writer: W) -> Result<usize, OutputError>
where
    T: Transport,
    W: Write,
{
    if !client.pubsub_id().is_empty() {
        writeln!(writer, "[{}] {}", client.pubsub_id(), client.action())?;
    }

    if client.column_count() == 0 {
        writeln!(writer, "{} ok", client.action())?;
        return Ok(0);
    }

    writeln!(writer, "{}", client.columns().join("\t"))?;
    let mut rows = 0;
    while client.next_row()? {
        let values = (0..client.column_count())
            .map(|ordinal| client.value_by_ordinal(ordinal))
            .collect::<Vec<_>>();
        writeln!(writer, "{}", values.join("\t"))?;
        rows += 1;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, time::Duration};

    use crate::protocol::{Frame, TransportError};

    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b".exit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_handles_statements() {
        let input = b"select * from stocks\n";
        let mut output = Vec::new();

        let res = prompt(&input[..], &mut output).unwrap();
        assert_eq!(Command::Execute(String::from("select * from stocks")), res);
    }

    #[test]
    fn prompt_end_of_input_exits() {
        let mut output = Vec::new();

        let res = prompt(&b""[..], &mut output).unwrap();
        assert_eq!(Command::Exit, res);
    }

    #[test]
    #[should_panic(expected = "unrecognized command '.something_wrong'")]
    fn prompt_unrecognized_command() {
        let input = b".something_wrong\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();
    }

    /// Replays canned frames, answering whatever request id was written last.
    #[derive(Default)]
    struct Replay {
        open: bool,
        last_id: u32,
        replies: VecDeque<(bool, String)>,
    }

    impl Transport for Replay {
        fn open(&mut self, _host: &str, _port: u16) -> Result<(), TransportError> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn write_framed(&mut self, request_id: u32, _payload: &[u8]) -> Result<(), TransportError> {
            self.last_id = request_id;
            Ok(())
        }

        fn read_framed(
            &mut self,
            _timeout: Option<Duration>,
        ) -> Result<Option<Frame>, TransportError> {
            Ok(self.replies.pop_front().map(|(published, payload)| Frame {
                request_id: if published { 0 } else { self.last_id },
                payload: payload.into_bytes(),
            }))
        }
    }

    fn client_with(replies: &[(bool, &str)]) -> Client<Replay> {
        let transport = Replay {
            replies: replies
                .iter()
                .map(|(published, payload)| (*published, payload.to_string()))
                .collect(),
            ..Default::default()
        };
        let mut client = Client::with_transport(transport);
        client.connect("localhost:7777").unwrap();
        client
    }

    #[test]
    fn writes_rows_as_table() {
        let mut client = client_with(&[
            (false, r#"{"status":"ok","action":"select","rows":3,"fromrow":1,"torow":2,"columns":["id","ticker"],"data":[["1","IBM"],["2","MSFT"]]}"#),
            (false, r#"{"status":"ok","action":"select","rows":3,"fromrow":3,"torow":3,"columns":["id","ticker"],"data":[["3","ORCL"]]}"#),
        ]);
        client.execute("select * from stocks").unwrap();
        let mut output = Vec::new();

        let rows = write_result(&mut client, &mut output).unwrap();

        assert_eq!(rows, 3);
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id\tticker\n1\tIBM\n2\tMSFT\n3\tORCL\n"
        );
    }

    #[test]
    fn writes_acknowledgement_without_columns() {
        let mut client = client_with(&[(false, r#"{"status":"ok","action":"subscribe","pubsubid":"4"}"#)]);
        client.execute("subscribe * from stocks").unwrap();
        let mut output = Vec::new();

        let rows = write_result(&mut client, &mut output).unwrap();

        assert_eq!(rows, 0);
        assert_eq!(String::from_utf8(output).unwrap(), "[4] subscribe\nsubscribe ok\n");
    }

    #[test]
    fn writes_published_message() {
        let mut client = client_with(&[(true, r#"{"status":"ok","action":"add","pubsubid":"4","rows":1,"fromrow":1,"torow":1,"columns":["ticker"],"data":[["IBM"]]}"#)]);
        assert!(client.wait_for_pubsub(Duration::from_millis(100)).unwrap());
        let mut output = Vec::new();

        write_result(&mut client, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "[4] add\nticker\nIBM\n");
    }
}

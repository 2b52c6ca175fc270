//! Text captures of BMS poll responses.
//!
//! One frame per line: `PID REMAIN DATA`, with the PID and the payload in hex and
//! the remaining byte count in decimal, e.g. `b0e1 4 13881400`. Everything after a
//! `#` is a comment.

use crate::error::{Error, Result};
use crate::protocol::Frame;
use std::io::BufRead;
use std::path::Path;

pub fn read_capture<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    log::debug!("Reading capture from {path:?}");
    let file = std::fs::File::open(path)?;
    parse_capture(std::io::BufReader::new(file))
}

pub fn parse_capture<R: BufRead>(reader: R) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(frame) = parse_line(n + 1, &line)? {
            frames.push(frame);
        }
    }
    log::debug!("Read {} frames", frames.len());
    Ok(frames)
}

fn parse_line(line_no: usize, line: &str) -> Result<Option<Frame>> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return Ok(None);
    }
    let parse_error = |reason: String| Error::Parse {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = content.split_whitespace().collect();
    let (pid, remain, data) = match fields.as_slice() {
        [pid, remain, data] => (*pid, *remain, *data),
        _ => {
            return Err(parse_error(format!(
                "expected 3 fields, found {}",
                fields.len()
            )))
        }
    };
    let pid = u16::from_str_radix(pid.trim_start_matches("0x"), 16)
        .map_err(|e| parse_error(format!("invalid PID {pid:?}: {e}")))?;
    let remain = remain
        .parse::<u16>()
        .map_err(|e| parse_error(format!("invalid remain {remain:?}: {e}")))?;
    let data = parse_hex(data).ok_or_else(|| parse_error(format!("invalid data {data:?}")))?;
    Ok(Some(Frame { pid, remain, data }))
}

pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    if !text.is_ascii() || text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_frames_and_comments() {
        let text = "# capture\n\nb0e1 4 13881400\n0xB041 0 0640 # bus voltage\n";
        let frames = parse_capture(text.as_bytes()).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame {
                    pid: 0xb0e1,
                    remain: 4,
                    data: vec![0x13, 0x88, 0x14, 0x00]
                },
                Frame {
                    pid: 0xb041,
                    remain: 0,
                    data: vec![0x06, 0x40]
                },
            ]
        );
    }

    #[test]
    fn reports_line_of_bad_frame() {
        let text = "b041 0 0640\nb041 zero 0640\n";
        match parse_capture(text.as_bytes()) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            parse_capture("b041 0\n".as_bytes()),
            Err(Error::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn hex_payloads() {
        assert_eq!(parse_hex(""), Some(vec![]));
        assert_eq!(parse_hex("00ff7F"), Some(vec![0x00, 0xff, 0x7f]));
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("zz"), None);
        assert_eq!(parse_hex("é0"), None);
    }
}

use super::Columns;
use super::EleFile;
use super::NodeFile;
use super::Ref;
use std::error;
use std::fmt;
use std::io;
use std::num;
use std::ops::Range;
use std::str;

const COMMENT: char = '#';

#[derive(Debug)]
pub enum ErrorKind {
    UnexpectedToken { expected: String, found: String },
    TokenCount { expected: usize, found: usize },
    MissingRecords { expected: usize, found: usize },
    Io(io::Error),
    BadInteger(num::ParseIntError),
    BadFloat(num::ParseFloatError),
}

/// Grammar violation in a node or ele file.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    lineno: usize,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Line the error was found at, starting from 1.
    ///
    /// Zero when the error is not tied to a line (e.g. a read failure before
    /// any byte was consumed).
    pub fn lineno(&self) -> usize {
        self.lineno
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found {:?}", expected, found)
            }
            ErrorKind::TokenCount { expected, found } => {
                write!(f, "expected {} tokens, found {}", expected, found)
            }
            ErrorKind::MissingRecords { expected, found } => {
                write!(f, "header declares {} records, found {}", expected, found)
            }
            ErrorKind::Io(err) => write!(f, "io error: {}", err),
            ErrorKind::BadInteger(err) => write!(f, "when parsing integer: {}", err),
            ErrorKind::BadFloat(err) => write!(f, "when parsing float: {}", err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at line {}: {}", self.lineno, self.kind)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            ErrorKind::BadInteger(err) => Some(err),
            ErrorKind::BadFloat(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error {
            kind: ErrorKind::Io(err),
            lineno: 0,
        }
    }
}

impl From<num::ParseIntError> for Error {
    fn from(err: num::ParseIntError) -> Error {
        Error {
            kind: ErrorKind::BadInteger(err),
            lineno: 0,
        }
    }
}

impl From<num::ParseFloatError> for Error {
    fn from(err: num::ParseFloatError) -> Error {
        Error {
            kind: ErrorKind::BadFloat(err),
            lineno: 0,
        }
    }
}

fn with_lineno<E>(lineno: usize) -> impl Fn(E) -> Error
where
    E: Into<Error>,
{
    move |err: E| {
        let mut err = err.into();
        err.lineno = lineno;
        err
    }
}

/// Byte range of the meaningful part of `line`, with any comment and
/// surrounding whitespace removed. `None` for blank and comment-only lines.
fn data_range(line: &str) -> Option<Range<usize>> {
    let content = match line.find(COMMENT) {
        Some(comment) => &line[..comment],
        None => line,
    };
    let start = content.len() - content.trim_start().len();
    let end = content.trim_end().len();
    if start < end {
        Some(start..end)
    } else {
        None
    }
}

/// Line reader that skips blank and comment lines while keeping count of
/// the physical line number.
struct DataLines<R> {
    input: R,
    line: String,
    lineno: usize,
}

impl<R: io::BufRead> DataLines<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
            lineno: 0,
        }
    }

    /// Returns the next data line along with its line number.
    fn next(&mut self) -> Result<Option<(usize, &str)>, Error> {
        let range = loop {
            self.line.clear();
            let n = self
                .input
                .read_line(&mut self.line)
                .map_err(with_lineno(self.lineno + 1))?;
            if n == 0 {
                return Ok(None);
            }
            self.lineno += 1;
            if let Some(range) = data_range(&self.line) {
                break range;
            }
        };
        Ok(Some((self.lineno, &self.line[range])))
    }
}

/// A file made of a header line followed by fixed-shape records.
pub(super) trait Records: Default {
    /// Decodes the header line, returning the declared record count and the
    /// column layout every record must follow.
    fn header(&mut self, line: &str, lineno: usize) -> Result<(usize, Columns), Error>;

    /// Decodes one record whose token count already matches the columns.
    fn record(&mut self, words: str::SplitWhitespace<'_>, lineno: usize) -> Result<(), Error>;

    /// Called once all records have been read.
    fn finish(&mut self) {}
}

fn parse_records<R, T>(input: R) -> Result<T, Error>
where
    R: io::BufRead,
    T: Records,
{
    let mut records = T::default();
    let mut lines = DataLines::new(input);

    let (count, columns) = match lines.next()? {
        Some((lineno, line)) => records.header(line, lineno)?,
        None => {
            return Err(Error {
                kind: ErrorKind::UnexpectedToken {
                    expected: String::from("header line"),
                    found: String::from("end of file"),
                },
                lineno: lines.lineno,
            })
        }
    };
    let expected = columns.token_count();

    for found_records in 0..count {
        let (lineno, line) = match lines.next()? {
            Some(next) => next,
            None => {
                return Err(Error {
                    kind: ErrorKind::MissingRecords {
                        expected: count,
                        found: found_records,
                    },
                    lineno: lines.lineno,
                })
            }
        };
        let found = line.split_whitespace().count();
        if found != expected {
            return Err(Error {
                kind: ErrorKind::TokenCount { expected, found },
                lineno,
            });
        }
        records.record(line.split_whitespace(), lineno)?;
    }

    if let Some((lineno, line)) = lines.next()? {
        return Err(Error {
            kind: ErrorKind::UnexpectedToken {
                expected: String::from("end of file"),
                found: line.to_owned(),
            },
            lineno,
        });
    }

    records.finish();
    Ok(records)
}

fn parse_header<const N: usize>(line: &str, lineno: usize) -> Result<[u32; N], Error> {
    let found = line.split_whitespace().count();
    if found != N {
        return Err(Error {
            kind: ErrorKind::TokenCount { expected: N, found },
            lineno,
        });
    }
    let mut header = [0; N];
    for (field, word) in header.iter_mut().zip(line.split_whitespace()) {
        *field = word.parse::<u32>().map_err(with_lineno(lineno))?;
    }
    Ok(header)
}

/// Upper bound on the number of values reserved from header counts alone.
const MAX_RESERVED: usize = 1 << 16;

/// Capacity to reserve for `count` records of `per_record` values each.
///
/// Headers are not trusted for allocation: past `MAX_RESERVED` values, buffers
/// grow as records are actually read.
fn reserve_hint(count: usize, per_record: usize) -> usize {
    count.saturating_mul(per_record).min(MAX_RESERVED)
}

/// Parses the next token of a record as `T`.
fn next_value<T>(words: &mut str::SplitWhitespace<'_>, lineno: usize) -> Result<T, Error>
where
    T: str::FromStr,
    T::Err: Into<Error>,
{
    match words.next() {
        Some(word) => word.parse::<T>().map_err(with_lineno(lineno)),
        None => Err(Error {
            kind: ErrorKind::Io(io::ErrorKind::UnexpectedEof.into()),
            lineno,
        }),
    }
}

impl Records for NodeFile {
    fn header(&mut self, line: &str, lineno: usize) -> Result<(usize, Columns), Error> {
        let [count, dimension, attributes, markers] = parse_header::<4>(line, lineno)?;
        if markers > 1 {
            return Err(Error {
                kind: ErrorKind::UnexpectedToken {
                    expected: String::from("boundary marker flag 0 or 1"),
                    found: markers.to_string(),
                },
                lineno,
            });
        }
        let count = count as usize;
        self.columns = Columns {
            primary: dimension as usize,
            attributes: attributes as usize,
            marker: markers == 1,
        };
        self.indices.reserve(reserve_hint(count, 1));
        self.coordinates.reserve(reserve_hint(count, self.columns.primary));
        self.attributes.reserve(reserve_hint(count, self.columns.attributes));
        if self.columns.marker {
            self.markers.reserve(reserve_hint(count, 1));
        }
        Ok((count, self.columns))
    }

    fn record(&mut self, mut words: str::SplitWhitespace<'_>, lineno: usize) -> Result<(), Error> {
        self.indices.push(next_value::<i64>(&mut words, lineno)?);
        for _ in 0..self.columns.primary {
            self.coordinates.push(next_value::<f64>(&mut words, lineno)?);
        }
        for _ in 0..self.columns.attributes {
            self.attributes.push(next_value::<f64>(&mut words, lineno)?);
        }
        if self.columns.marker {
            self.markers.push(next_value::<Ref>(&mut words, lineno)?);
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.first_index = self.indices.iter().copied().min().unwrap_or(0);
    }
}

impl Records for EleFile {
    fn header(&mut self, line: &str, lineno: usize) -> Result<(usize, Columns), Error> {
        let [count, nodes_per_element, attributes] = parse_header::<3>(line, lineno)?;
        let count = count as usize;
        self.columns = Columns {
            primary: nodes_per_element as usize,
            attributes: attributes as usize,
            marker: false,
        };
        self.count = count;
        self.vertex_refs.reserve(reserve_hint(count, self.columns.primary));
        self.attributes.reserve(reserve_hint(count, self.columns.attributes));
        Ok((count, self.columns))
    }

    fn record(&mut self, mut words: str::SplitWhitespace<'_>, lineno: usize) -> Result<(), Error> {
        // Elements keep their file order, their own index is only checked for shape.
        let _index = next_value::<i64>(&mut words, lineno)?;
        for _ in 0..self.columns.primary {
            self.vertex_refs.push(next_value::<i64>(&mut words, lineno)?);
        }
        for _ in 0..self.columns.attributes {
            self.attributes.push(next_value::<f64>(&mut words, lineno)?);
        }
        Ok(())
    }
}

/// Parses the content of a node file.
///
/// Wrapping `input` in a [`std::io::BufReader`] is recommended.
pub fn parse_node<R: io::BufRead>(input: R) -> Result<NodeFile, Error> {
    parse_records(input)
}

/// Parses the content of an ele file.
///
/// Wrapping `input` in a [`std::io::BufReader`] is recommended.
pub fn parse_ele<R: io::BufRead>(input: R) -> Result<EleFile, Error> {
    parse_records(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node() {
        let input = "# cube corners
        4 3 1 1

        1 0.0 0.0 0.0 0.5 1
        2 1.0 0.0 0.0 0.5 0 # trailing comment
        3 0.0 1.0 0.0 1.5 0
        4 0.0 0.0 1.0 2.5 1


        ";
        let nodes = parse_node(input.as_bytes()).unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes.dimension(), 3);
        assert_eq!(nodes.attribute_count(), 1);
        assert!(nodes.has_markers());
        assert_eq!(nodes.first_index(), 1);
        assert_eq!(nodes.coordinates()[3..6], [1.0, 0.0, 0.0]);
        assert_eq!(nodes.attributes(), [0.5, 0.5, 1.5, 2.5]);
        assert_eq!(nodes.markers(), [1, 0, 0, 1]);
    }

    #[test]
    fn test_parse_ele() {
        let input = "2 4 1\r\n0 0 1 2 3 7\r\n1 1 2 3 4 -2\r\n";
        let elements = parse_ele(input.as_bytes()).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements.nodes_per_element(), 4);
        assert_eq!(elements.vertex_refs(), [0, 1, 2, 3, 1, 2, 3, 4]);
        assert_eq!(elements.attributes(), [7.0, -2.0]);
    }

    #[test]
    fn test_bad_float_lineno() {
        let input = "2 2 0 0\n0 1.0 2.0\n# skipped\n1 1.0 two\n";
        let err = parse_node(input.as_bytes()).unwrap_err();
        assert_eq!(err.lineno(), 4);
        assert!(matches!(err.kind(), ErrorKind::BadFloat(_)));
    }

    #[test]
    fn test_token_count_mismatch() {
        let input = "1 3 0 1\n0 1.0 2.0 3.0\n";
        let err = parse_node(input.as_bytes()).unwrap_err();
        assert_eq!(err.lineno(), 2);
        assert!(matches!(
            err.kind(),
            ErrorKind::TokenCount {
                expected: 5,
                found: 4
            }
        ));
    }

    #[test]
    fn test_header_shape() {
        let err = parse_ele("1 4\n0 0 1 2 3\n".as_bytes()).unwrap_err();
        assert_eq!(err.lineno(), 1);
        assert!(matches!(
            err.kind(),
            ErrorKind::TokenCount {
                expected: 3,
                found: 2
            }
        ));

        let err = parse_node("1 3 0 2\n0 1 2 3 4\n".as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));

        let err = parse_node("-1 3 0 0\n".as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::BadInteger(_)));
    }

    #[test]
    fn test_missing_and_extra_records() {
        let err = parse_ele("2 4 0\n0 0 1 2 3\n\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingRecords {
                expected: 2,
                found: 1
            }
        ));

        let err = parse_ele("1 4 0\n0 0 1 2 3\n1 0 1 2 3\n".as_bytes()).unwrap_err();
        assert_eq!(err.lineno(), 3);
        assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn test_empty_input() {
        let err = parse_node("# nothing here\n\n".as_bytes()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnexpectedToken { .. }));

        let nodes = parse_node("0 3 0 0\n".as_bytes()).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_index_must_be_integer() {
        let err = parse_ele("1 4 0\n0 0 1.5 2 3\n".as_bytes()).unwrap_err();
        assert_eq!(err.lineno(), 2);
        assert!(matches!(err.kind(), ErrorKind::BadInteger(_)));
    }

    #[test]
    fn test_huge_header_counts() {
        let err = parse_node("4294967295 4294967295 0 0\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingRecords {
                expected: 4294967295,
                found: 0,
            }
        ));

        let err = parse_ele("4294967295 4294967295 4294967295\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingRecords { found: 0, .. }
        ));

        let err = parse_ele("4294967295 4 0\n0 0 1 2 3\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingRecords { found: 1, .. }
        ));
        assert_eq!(reserve_hint(usize::MAX, 3), MAX_RESERVED);
        assert_eq!(reserve_hint(10, 3), 30);
    }
}

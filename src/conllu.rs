//! CoNLL-U file parsing
//!
//! Reads dependency parses in CoNLL-U format and turns each sentence into a
//! [`RawNode`] dependency tree: the word is the token form, the attributes
//! are UPOS and XPOS, the link is DEPREL and the span is the token's byte
//! offset in the sentence text. Multiword token ranges and empty nodes are
//! skipped.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use memchr::memmem;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use thiserror::Error;

use crate::lexicon::open_text;
use crate::raw::{RawNode, RawSpan};

/// Error during CoNLL-U parsing
#[derive(Debug, Error)]
#[error("Parse error at line {line_num}: {message}")]
pub struct ParseError {
    pub line_num: usize,
    pub message: String,
}

/// One parsed sentence
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySentence {
    /// `# sent_id`, if present
    pub id: Option<String>,
    /// `# text`, or the forms joined by spaces
    pub text: String,
    pub root: RawNode,
}

/// A token line
#[derive(Debug, Clone)]
struct Token {
    line_num: usize,
    id: usize,
    form: String,
    upos: String,
    xpos: Option<String>,
    head: Option<usize>,
    deprel: String,
}

/// CoNLL-U reader that iterates over sentences
pub struct CoNLLUReader<R: BufRead> {
    lines: Lines<R>,
    line_num: usize,
}

impl CoNLLUReader<Box<dyn BufRead>> {
    /// Create a reader from a file path, decompressing `.gz` files
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            lines: open_text(path)?.lines(),
            line_num: 0,
        })
    }
}

impl CoNLLUReader<BufReader<std::io::Cursor<String>>> {
    /// Create a reader from a string
    pub fn from_str(text: &str) -> Self {
        let cursor = std::io::Cursor::new(text.to_string());
        Self {
            lines: BufReader::new(cursor).lines(),
            line_num: 0,
        }
    }
}

impl<R: BufRead> Iterator for CoNLLUReader<R> {
    type Item = Result<DependencySentence, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut tokens = Vec::new();
        let mut sentence_id = None;
        let mut sentence_text = None;

        loop {
            self.line_num += 1;
            match self.lines.next() {
                None => {
                    if tokens.is_empty() {
                        return None;
                    }
                    break;
                }
                Some(Err(e)) => {
                    return Some(Err(ParseError {
                        line_num: self.line_num,
                        message: format!("IO error: {}", e),
                    }));
                }
                Some(Ok(line)) => {
                    let line = line.trim_end_matches(['\r', '\n']);

                    if line.trim().is_empty() {
                        if !tokens.is_empty() {
                            break;
                        }
                        continue;
                    }

                    if let Some(comment) = line.strip_prefix('#') {
                        parse_comment(comment, &mut sentence_id, &mut sentence_text);
                        continue;
                    }

                    match parse_line(line, self.line_num) {
                        Ok(Some(token)) => tokens.push(token),
                        Ok(None) => {}
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }

        Some(build_sentence(tokens, sentence_id, sentence_text))
    }
}

/// Parse a comment line (after the #)
fn parse_comment(comment: &str, id: &mut Option<String>, text: &mut Option<String>) {
    let Some((key, value)) = comment.split_once('=') else {
        return;
    };
    match key.trim() {
        "text" => *text = Some(value.trim().to_string()),
        "sent_id" => *id = Some(value.trim().to_string()),
        _ => {}
    }
}

/// Parse a single CoNLL-U line
/// Returns None for multiword tokens and empty nodes
fn parse_line(line: &str, line_num: usize) -> Result<Option<Token>, ParseError> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() != 10 {
        return Err(ParseError {
            line_num,
            message: format!("Expected 10 fields, found {}", fields.len()),
        });
    }

    // Field 0: ID; ranges (1-2) and empty nodes (2.1) carry no tree edge
    if fields[0].contains(['-', '.']) {
        return Ok(None);
    }
    let id = parse_index(fields[0], "ID", line_num)?;
    if id == 0 {
        return Err(ParseError {
            line_num,
            message: "Token IDs start at 1".to_string(),
        });
    }

    let head = match fields[6] {
        "0" => None,
        "_" => {
            return Err(ParseError {
                line_num,
                message: "Missing HEAD".to_string(),
            });
        }
        s => Some(parse_index(s, "HEAD", line_num)?),
    };

    Ok(Some(Token {
        line_num,
        id,
        form: fields[1].to_string(),
        upos: fields[3].to_string(),
        xpos: (fields[4] != "_").then(|| fields[4].to_string()),
        head,
        deprel: fields[7].to_string(),
    }))
}

fn parse_index(s: &str, field: &str, line_num: usize) -> Result<usize, ParseError> {
    s.parse().map_err(|_| ParseError {
        line_num,
        message: format!("Invalid {}: {}", field, s),
    })
}

/// Assemble tokens into a dependency tree over the sentence text
fn build_sentence(
    tokens: Vec<Token>,
    id: Option<String>,
    text: Option<String>,
) -> Result<DependencySentence, ParseError> {
    let last_line = tokens.last().map(|t| t.line_num).unwrap_or(0);
    let text = text.unwrap_or_else(|| {
        tokens
            .iter()
            .map(|t| t.form.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    });

    // token offsets, searched left to right
    let mut cursor = 0;
    let mut spans = Vec::with_capacity(tokens.len());
    for token in &tokens {
        let found = text
            .get(cursor..)
            .and_then(|rest| memmem::find(rest.as_bytes(), token.form.as_bytes()));
        match found {
            Some(pos) => {
                let start = cursor + pos;
                cursor = start + token.form.len();
                spans.push(Some(RawSpan {
                    start,
                    end: cursor,
                }));
            }
            None => spans.push(None),
        }
    }

    let position = |token_id: usize| tokens.iter().position(|t| t.id == token_id);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); tokens.len()];
    let mut roots = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.head {
            None => roots.push(i),
            Some(head) => {
                let Some(parent) = position(head) else {
                    return Err(ParseError {
                        line_num: token.line_num,
                        message: format!("HEAD {} does not refer to a token", head),
                    });
                };
                children[parent].push(i);
            }
        }
    }

    let root = match roots[..] {
        [root] => root,
        _ => {
            return Err(ParseError {
                line_num: last_line,
                message: format!("Expected one root, found {}", roots.len()),
            });
        }
    };

    let mut visited = vec![false; tokens.len()];
    let root = build_node(root, &tokens, &spans, &children, &mut visited);
    if let Some(orphan) = visited.iter().position(|&v| !v) {
        return Err(ParseError {
            line_num: tokens[orphan].line_num,
            message: "Token is not reachable from the root".to_string(),
        });
    }

    Ok(DependencySentence { id, text, root })
}

fn build_node(
    index: usize,
    tokens: &[Token],
    spans: &[Option<RawSpan>],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> RawNode {
    visited[index] = true;
    let token = &tokens[index];
    let mut attributes = vec![token.upos.clone()];
    if let Some(xpos) = &token.xpos {
        attributes.push(xpos.clone());
    }
    RawNode {
        word: token.form.clone(),
        node_type: token.upos.clone(),
        attributes,
        link: token.deprel.clone(),
        spans: spans[index].into_iter().collect(),
        children: children[index]
            .iter()
            .map(|&c| build_node(c, tokens, spans, children, visited))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    const SAMPLE: &str = "# sent_id = 1
# text = Which rivers flow into the Black Sea?
1\tWhich\twhich\tDET\tWDT\t_\t2\tdet\t_\t_
2\trivers\triver\tNOUN\tNNS\t_\t3\tnsubj\t_\t_
3\tflow\tflow\tVERB\tVBP\t_\t0\tROOT\t_\t_
4\tinto\tinto\tADP\tIN\t_\t3\tprep\t_\t_
5\tthe\tthe\tDET\tDT\t_\t7\tdet\t_\t_
6\tBlack\tBlack\tPROPN\tNNP\t_\t7\tcompound\t_\t_
7\tSea\tSea\tPROPN\tNNP\t_\t4\tpobj\t_\tSpaceAfter=No
8\t?\t?\tPUNCT\t.\t_\t3\tpunct\t_\t_

";

    #[test]
    fn test_parse_sentence() {
        let mut reader = CoNLLUReader::from_str(SAMPLE);
        let sentence = reader.next().unwrap().unwrap();

        assert_eq!(sentence.id.as_deref(), Some("1"));
        assert_eq!(sentence.text, "Which rivers flow into the Black Sea?");
        assert_eq!(sentence.root.word, "flow");
        assert_eq!(sentence.root.link, "ROOT");
        assert_eq!(sentence.root.len(), 8);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_spans_and_attributes() {
        let sentence = CoNLLUReader::from_str(SAMPLE).next().unwrap().unwrap();
        let into = &sentence.root.children[1];
        let sea = &into.children[0];

        assert_eq!(into.attributes, vec!["ADP".to_string(), "IN".to_string()]);
        assert_eq!(sea.word, "Sea");
        assert_eq!(sea.spans, vec![RawSpan { start: 33, end: 36 }]);
    }

    #[test]
    fn test_builds_dependency_tree() {
        let sentence = CoNLLUReader::from_str(SAMPLE).next().unwrap().unwrap();
        let tree = Tree::from_dependency(&sentence.root, &sentence.text);

        let sea = tree.find_all(|n| n.label == "Sea")[0];
        assert_eq!(tree.node(tree.parent(sea).unwrap()).label, "into");
        assert!(tree.issues.is_empty());
    }

    #[test]
    fn test_skips_multiword_tokens() {
        let text = "1-2\tdel\t_\t_\t_\t_\t_\t_\t_\t_
1\tde\tde\tADP\t_\t_\t2\tcase\t_\t_
2\tel\tel\tDET\t_\t_\t0\troot\t_\t_
";
        let sentence = CoNLLUReader::from_str(text).next().unwrap().unwrap();
        assert_eq!(sentence.text, "de el");
        assert_eq!(sentence.root.children.len(), 1);
    }

    #[test]
    fn test_errors() {
        let bad_fields = "1\tword\n";
        let err = CoNLLUReader::from_str(bad_fields).next().unwrap().unwrap_err();
        assert_eq!(err.line_num, 1);
        assert_eq!(err.to_string(), "Parse error at line 1: Expected 10 fields, found 2");

        let two_roots = "1\ta\ta\tX\t_\t_\t0\troot\t_\t_
2\tb\tb\tX\t_\t_\t0\troot\t_\t_
";
        let err = CoNLLUReader::from_str(two_roots).next().unwrap().unwrap_err();
        assert!(err.message.contains("one root"));

        let dangling = "1\ta\ta\tX\t_\t_\t5\tdep\t_\t_
2\tb\tb\tX\t_\t_\t0\troot\t_\t_
";
        let err = CoNLLUReader::from_str(dangling).next().unwrap().unwrap_err();
        assert_eq!(err.line_num, 1);
    }

    #[test]
    fn test_reads_gzip_file() {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.conllu.gz");
        let mut encoder = GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            Compression::default(),
        );
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let sentences: Vec<_> = CoNLLUReader::from_file(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(sentences.len(), 1);
    }
}

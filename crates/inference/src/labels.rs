use std::fs;
use std::path::Path;

/// Class-index to name lookup.
///
/// Indices with no known name resolve to the index itself, so a model trained
/// with more classes than the label file lists still produces usable labels.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// One label per line; blank lines and `#` comments are skipped.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read labels from {}: {}", path.display(), e))?;

        let names: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        tracing::info!(path = %path.display(), count = names.len(), "Loaded class labels");

        Ok(Self { names })
    }

    /// Parse the `names` entry a YOLO ONNX export writes into its custom
    /// metadata, e.g. `{0: 'pothole', 1: 'garbage'}`.
    ///
    /// Missing indices are filled with the index itself.
    pub fn from_metadata(raw: &str) -> anyhow::Result<Self> {
        let body = raw
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| anyhow::anyhow!("Class names metadata is not a dict: {}", raw))?;

        let mut entries: Vec<(usize, String)> = Vec::new();
        let mut rest = body.trim_start();

        while !rest.is_empty() {
            let (key, after_key) = rest
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("Missing `:` in class names near `{}`", rest))?;
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Class index `{}` is not a number", key.trim()))?;

            let (name, after_name) = parse_quoted(after_key.trim_start())?;
            entries.push((index, name));

            rest = after_name.trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        let len = entries.iter().map(|(i, _)| i + 1).max().unwrap_or(0);
        let mut names: Vec<String> = (0..len).map(|i| i.to_string()).collect();
        for (index, name) in entries {
            names[index] = name;
        }

        Ok(Self { names })
    }

    pub fn name(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Split a leading `'...'` or `"..."` literal off `input`, honoring backslash escapes.
fn parse_quoted(input: &str) -> anyhow::Result<(String, &str)> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => anyhow::bail!("Expected a quoted class name near `{}`", input),
    };

    let mut name = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            name.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((name, &input[i + c.len_utf8()..]));
        } else {
            name.push(c);
        }
    }

    anyhow::bail!("Unterminated class name in `{}`", input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_index_falls_back_to_number() {
        let labels = LabelMap::new(vec!["pothole".to_string()]);
        assert_eq!(labels.name(0), "pothole");
        assert_eq!(labels.name(3), "3");
    }

    #[test]
    fn test_empty_map_uses_indices() {
        let labels = LabelMap::default();
        assert!(labels.is_empty());
        assert_eq!(labels.name(0), "0");
    }

    #[test]
    fn test_load_skips_blank_lines_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# civic issues").unwrap();
        writeln!(file, "pothole").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  garbage  ").unwrap();
        writeln!(file, "graffiti").unwrap();

        let labels = LabelMap::load(file.path()).unwrap();

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(0), "pothole");
        assert_eq!(labels.name(1), "garbage");
        assert_eq!(labels.name(2), "graffiti");
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let err = LabelMap::load("/nonexistent/labels.txt").unwrap_err();
        assert!(err.to_string().contains("Failed to read labels"));
    }

    #[test]
    fn test_from_metadata_parses_yolo_names() {
        let labels = LabelMap::from_metadata("{0: 'pothole', 1: 'garbage', 2: 'graffiti'}").unwrap();

        assert_eq!(labels.len(), 3);
        assert_eq!(labels.name(0), "pothole");
        assert_eq!(labels.name(2), "graffiti");
        assert_eq!(labels.name(7), "7");
    }

    #[test]
    fn test_from_metadata_handles_quotes_and_gaps() {
        let labels =
            LabelMap::from_metadata(r#"{0: "broken light", 2: 'driver\'s side', 1: 'a, b'}"#)
                .unwrap();

        assert_eq!(labels.name(0), "broken light");
        assert_eq!(labels.name(1), "a, b");
        assert_eq!(labels.name(2), "driver's side");

        let sparse = LabelMap::from_metadata("{2: 'sign'}").unwrap();
        assert_eq!(sparse.len(), 3);
        assert_eq!(sparse.name(0), "0");
        assert_eq!(sparse.name(2), "sign");
    }

    #[test]
    fn test_from_metadata_empty_dict() {
        let labels = LabelMap::from_metadata("{}").unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_from_metadata_rejects_malformed_input() {
        assert!(LabelMap::from_metadata("['pothole']").is_err());
        assert!(LabelMap::from_metadata("{zero: 'pothole'}").is_err());
        assert!(LabelMap::from_metadata("{0: pothole}").is_err());
        assert!(LabelMap::from_metadata("{0: 'pothole}").is_err());
    }
}

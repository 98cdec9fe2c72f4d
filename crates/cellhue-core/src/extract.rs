//! Splitting a cell's text into colored runs.

use serde::Serialize;

use crate::color::{ColorSource, Rgb};
use crate::error::HostError;
use crate::host::SheetSource;

/// A span of cell text in one color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextRun {
    /// Never empty.
    pub text: String,
    pub color: Rgb,
    pub source: ColorSource,
}

/// Extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Used for portions whose color is automatic.
    pub fallback: Rgb,
    /// Merge neighbouring runs that share color and source.
    pub coalesce: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            fallback: Rgb::BLACK,
            coalesce: false,
        }
    }
}

/// Read the runs of `cell` in document order.
///
/// The concatenated run texts equal the cell string: each paragraph break
/// is carried by the last run before it, or by the first run after it when
/// the paragraph before is empty. A cell without text yields no runs.
pub async fn extract_runs<S: SheetSource>(
    source: &mut S,
    cell: &S::Cell,
    options: &ExtractOptions,
) -> Result<Vec<TextRun>, HostError> {
    let paragraphs = source.paragraphs(cell).await?;
    let mut runs: Vec<TextRun> = Vec::new();
    let mut pending_breaks = String::new();
    let mut previous_had_text = false;

    for (index, paragraph) in paragraphs.iter().enumerate() {
        if index > 0 {
            match runs.last_mut() {
                Some(last) if previous_had_text => last.text.push('\n'),
                _ => pending_breaks.push('\n'),
            }
        }
        previous_had_text = false;

        for portion in paragraph {
            let mut text = source.portion_text(portion).await?;
            if text.is_empty() {
                continue;
            }
            let (color, color_source) = match source.portion_color(portion).await? {
                Some(color) => (color, ColorSource::Explicit),
                None => (options.fallback, ColorSource::Fallback),
            };
            if !pending_breaks.is_empty() {
                text.insert_str(0, &std::mem::take(&mut pending_breaks));
            }
            runs.push(TextRun {
                text,
                color,
                source: color_source,
            });
            previous_had_text = true;
        }
    }

    if !pending_breaks.is_empty() {
        match runs.last_mut() {
            Some(last) => last.text.push_str(&pending_breaks),
            None => runs.push(TextRun {
                text: pending_breaks,
                color: options.fallback,
                source: ColorSource::Fallback,
            }),
        }
    }

    if options.coalesce {
        runs = coalesce(runs);
    }
    Ok(runs)
}

/// Merge adjacent runs with identical color and source.
pub fn coalesce(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut merged: Vec<TextRun> = Vec::with_capacity(runs.len());
    for run in runs {
        match merged.last_mut() {
            Some(prev) if prev.color == run.color && prev.source == run.source => {
                prev.text.push_str(&run.text)
            }
            _ => merged.push(run),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::CellAddress;
    use crate::memory::{MemorySheet, Portion};
    use pretty_assertions::assert_eq;

    const RED: Rgb = Rgb::new(255, 0, 0);

    async fn runs_of(paragraphs: Vec<Vec<Portion>>, options: ExtractOptions) -> Vec<TextRun> {
        let mut sheet = MemorySheet::new("Sheet1");
        let at = CellAddress::new(0, 0);
        sheet.set_paragraphs(at, paragraphs);
        let cell = sheet.cell(at).await.unwrap();
        extract_runs(&mut sheet, &cell, &options).await.unwrap()
    }

    fn run(text: &str, color: Rgb, source: ColorSource) -> TextRun {
        TextRun {
            text: text.into(),
            color,
            source,
        }
    }

    #[tokio::test]
    async fn repeated_colors_stay_separate() {
        let runs = runs_of(
            vec![vec![
                Portion::colored("Hello ", Rgb::BLACK),
                Portion::colored("World", RED),
                Portion::colored("!", Rgb::BLACK),
            ]],
            ExtractOptions::default(),
        )
        .await;
        assert_eq!(
            runs,
            vec![
                run("Hello ", Rgb::BLACK, ColorSource::Explicit),
                run("World", RED, ColorSource::Explicit),
                run("!", Rgb::BLACK, ColorSource::Explicit),
            ]
        );
    }

    #[tokio::test]
    async fn automatic_color_uses_fallback() {
        let options = ExtractOptions {
            fallback: Rgb::new(9, 9, 9),
            ..Default::default()
        };
        let runs = runs_of(vec![vec![Portion::automatic("plain")]], options).await;
        assert_eq!(runs, vec![run("plain", Rgb::new(9, 9, 9), ColorSource::Fallback)]);
    }

    #[tokio::test]
    async fn empty_portions_and_empty_cell() {
        let runs = runs_of(
            vec![vec![Portion::colored("", RED), Portion::automatic("x")]],
            ExtractOptions::default(),
        )
        .await;
        assert_eq!(runs.len(), 1);

        assert!(runs_of(vec![], ExtractOptions::default()).await.is_empty());
    }

    #[tokio::test]
    async fn paragraph_breaks_attach_to_neighbours() {
        let runs = runs_of(
            vec![
                vec![Portion::colored("a", RED)],
                vec![],
                vec![Portion::automatic("b")],
                vec![],
            ],
            ExtractOptions::default(),
        )
        .await;
        assert_eq!(
            runs,
            vec![
                run("a\n", RED, ColorSource::Explicit),
                run("\nb\n", Rgb::BLACK, ColorSource::Fallback),
            ]
        );
    }

    #[tokio::test]
    async fn only_empty_paragraphs() {
        let runs = runs_of(vec![vec![], vec![], vec![]], ExtractOptions::default()).await;
        assert_eq!(runs, vec![run("\n\n", Rgb::BLACK, ColorSource::Fallback)]);
    }

    #[tokio::test]
    async fn coalesce_merges_only_neighbours() {
        let options = ExtractOptions {
            coalesce: true,
            ..Default::default()
        };
        let runs = runs_of(
            vec![vec![
                Portion::colored("a", RED),
                Portion::colored("b", RED),
                Portion::automatic("c"),
                Portion::colored("d", RED),
            ]],
            options,
        )
        .await;
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["ab", "c", "d"]);
    }
}

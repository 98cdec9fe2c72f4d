//! End-to-end extraction over the in-memory host.

use cellhue_core::{
    walk_sheet, CellAddress, Classifier, ColorSource, ExtractOptions, MemorySheet, Portion,
    Report, ReportFormat, ReportWriter, Rgb, SheetReport, SheetSource,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const RED: Rgb = Rgb::new(255, 0, 0);

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(f)
}

#[tokio::test]
async fn hello_world_report() {
    let mut sheet = MemorySheet::new("Sheet1");
    sheet.set_portions(
        CellAddress::new(0, 0),
        vec![
            Portion::colored("Hello ", Rgb::BLACK),
            Portion::colored("World", RED),
            Portion::colored("!", Rgb::BLACK),
        ],
    );
    sheet.set_blank(CellAddress::new(1, 1));
    sheet.set_text(CellAddress::new(2, 0), "plain");

    let cells = walk_sheet(&mut sheet, &ExtractOptions::default())
        .await
        .unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0].runs.len(), 3);
    assert_eq!(cells[1].runs[0].source, ColorSource::Fallback);

    let report = Report {
        sheets: vec![SheetReport {
            source: "Book.xlsx".into(),
            index: 0,
            name: sheet.sheet_name().await.unwrap(),
            cells,
        }],
    };
    let classifier = Classifier::default();
    let mut out = Vec::new();
    ReportWriter::new(&classifier, ReportFormat::Text)
        .write(&report, &mut out)
        .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "# cellhue report\n\
         # source: Book.xlsx\n\
         # sheet 0: Sheet1\n\
         # cells: 2\n\
         A1\t1\t0,0,0\tblack\texplicit\tHello \n\
         A1\t2\t255,0,0\tred\texplicit\tWorld\n\
         A1\t3\t0,0,0\tblack\texplicit\t!\n\
         A3\t1\t0,0,0\tblack\tfallback\tplain\n"
    );
}

#[tokio::test]
async fn same_input_gives_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = Classifier::default();

    let mut contents = Vec::new();
    for name in ["first.json", "second.json"] {
        let mut sheet = MemorySheet::new("Data");
        sheet.set_text(CellAddress::new(0, 0), "one\ntwo");
        sheet.set_portions(
            CellAddress::new(0, 3),
            vec![Portion::colored("x", Rgb::new(255, 165, 0))],
        );
        let cells = walk_sheet(&mut sheet, &ExtractOptions::default())
            .await
            .unwrap();
        let report = Report {
            sheets: vec![SheetReport {
                source: "Book.ods".into(),
                index: 0,
                name: "Data".into(),
                cells,
            }],
        };
        let path = dir.path().join(name);
        ReportWriter::new(&classifier, ReportFormat::Json)
            .write_file(&report, &path)
            .unwrap();
        contents.push(std::fs::read(&path).unwrap());
    }
    assert_eq!(contents[0], contents[1]);
}

fn portion() -> impl Strategy<Value = Portion> {
    ("[a-z \t]{0,6}", proptest::option::of(any::<u32>())).prop_map(|(text, color)| Portion {
        text,
        color: color.map(Rgb::from_packed),
    })
}

fn paragraphs() -> impl Strategy<Value = Vec<Vec<Portion>>> {
    proptest::collection::vec(proptest::collection::vec(portion(), 0..4), 0..4)
}

proptest! {
    #[test]
    fn runs_partition_the_cell_text(paras in paragraphs(), coalesce in any::<bool>()) {
        let (text, runs) = block_on(async {
            let mut sheet = MemorySheet::new("S");
            let at = CellAddress::new(0, 0);
            sheet.set_paragraphs(at, paras);
            let cell = sheet.cell(at).await.unwrap();
            let text = sheet.cell_text(&cell).await.unwrap();
            let options = ExtractOptions { coalesce, ..Default::default() };
            let runs = cellhue_core::extract_runs(&mut sheet, &cell, &options).await.unwrap();
            (text, runs)
        });

        let joined: String = runs.iter().map(|r| r.text.as_str()).collect();
        prop_assert_eq!(joined, text);
        prop_assert!(runs.iter().all(|r| !r.text.is_empty()));
        if coalesce {
            for pair in runs.windows(2) {
                prop_assert!(pair[0].color != pair[1].color || pair[0].source != pair[1].source);
            }
        }
    }
}

use chrono::NaiveDate;
use polars::prelude::*;
use rki_report::data::schema::{cases, clinical, nowcast};
use rki_report::data::{
    load_source, read_dates, read_ints, DataProcessor, NormalizeOptions, RawTable, SourceId,
};
use std::fs;
use tempfile::TempDir;

const CASE_OVERVIEW: &str = "\
ObjectId,IdBundesland,Bundesland,Landkreis,Altersgruppe,Geschlecht,AnzahlFall,AnzahlTodesfall,Meldedatum,IdLandkreis,Datenstand,NeuerFall,NeuerTodesfall,Refdatum,NeuGenesen,AnzahlGenesen,IstErkrankungsbeginn,Altersgruppe2
1,11,Berlin,SK Berlin Mitte,A35-A59,M,2,0,2020/03/16 00:00:00,11001,\"05.01.2021, 00:00 Uhr\",0,-9,2020/03/10 00:00:00,0,2,1,Nicht übermittelt
2,9,Bayern,SK München,A80+,W,1,1,2021/01/02 00:00:00,09162,\"05.01.2021, 00:00 Uhr\",0,0,2020/12/28 00:00:00,-9,0,1,Nicht übermittelt
3,11,Berlin,SK Berlin Pankow,A15-A34,W,4,0,2020/10/05 00:00:00,11003,\"05.01.2021, 00:00 Uhr\",0,-9,2020/10/07 00:00:00,0,4,0,Nicht übermittelt
";

fn load(id: SourceId, content: &str) -> (TempDir, RawTable) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(id.spec().file_name);
    fs::write(&path, content).unwrap();
    let table = load_source(&path, &id.spec()).unwrap();
    (dir, table)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ints(df: &DataFrame, name: &str) -> Vec<i64> {
    read_ints(df, name).unwrap().into_iter().map(|v| v.unwrap()).collect()
}

#[test]
fn case_overview_end_to_end() {
    let (_dir, raw) = load(SourceId::CaseOverview, CASE_OVERVIEW);
    assert_eq!(raw.height(), 3);
    assert_eq!(raw.rows[0][10], "05.01.2021, 00:00 Uhr");

    let df = DataProcessor::normalize_cases(&raw.to_dataframe().unwrap()).unwrap();

    assert_eq!(
        read_dates(&df, "cases", cases::REPORT_DATE).unwrap(),
        vec![date(2020, 3, 16), date(2021, 1, 2), date(2020, 10, 5)]
    );
    assert_eq!(
        read_dates(&df, "cases", cases::REF_DATE).unwrap(),
        vec![date(2020, 3, 10), date(2020, 12, 28), date(2020, 10, 7)]
    );
    assert_eq!(ints(&df, cases::REPORT_DELAY), vec![6, 5, -2]);
    assert_eq!(ints(&df, cases::REPORT_DATE_WEEK), vec![12, 53, 41]);
    // 2021-01-02 is in ISO week 53 of 2020.
    assert_eq!(ints(&df, cases::REPORT_DATE_YEAR), vec![2020, 2020, 2020]);
    assert_eq!(ints(&df, cases::REPORT_DATE_DAYOFWEEK), vec![0, 5, 0]);
    assert_eq!(ints(&df, cases::REF_DATE_WEEK), vec![11, 53, 41]);
    assert_eq!(ints(&df, cases::CASES), vec![2, 1, 4]);
    assert_eq!(ints(&df, cases::NEW_DEATH), vec![-9, 0, -9]);

    // District ids keep their leading zero.
    let districts = df.column(cases::DISTRICT_ID).unwrap().str().unwrap().clone();
    assert_eq!(districts.get(1), Some("09162"));

    for dropped in ["ObjectId", "Datenstand", "Altersgruppe2", "Meldedatum"] {
        assert!(df.column(dropped).is_err(), "{dropped} should be gone");
    }
}

#[test]
fn normalizing_twice_changes_nothing() {
    let (_dir, raw) = load(SourceId::CaseOverview, CASE_OVERVIEW);
    let once = DataProcessor::normalize_cases(&raw.to_dataframe().unwrap()).unwrap();
    let again_raw = RawTable::from_dataframe(&once).unwrap().to_dataframe().unwrap();
    let twice = DataProcessor::normalize_cases(&again_raw).unwrap();

    assert_eq!(once.get_column_names(), twice.get_column_names());
    assert!(once.equals_missing(&twice));
}

#[test]
fn clinical_is_idempotent_after_preamble() {
    let content = "\
Klinische Aspekte;;;
Stand: 05.01.2021;;;
;Meldejahr;MW;Fälle gesamt;Mittelwert Alter (Jahre);Männer;Frauen;Anzahl mit Angaben zu Symptomen;Anteil keine, bzw. keine für COVID-19 bedeutsamen Symptome;Anzahl mit Angaben zur Hospitalisierung;Anzahl hospitalisiert;Anteil hospitalisiert;Anzahl Verstorben;Anteil Verstorben
0;2020;10;1000;45,5;0,52;0,48;800;0,25;700;100;0,14;10;0,01
1;2020;11;2000;47,25;0,5;0,5;1500;0,2;1200;150;0,125;30;0,015
";
    let (_dir, raw) = load(SourceId::Clinical, content);
    let once = DataProcessor::normalize_clinical(&raw.to_dataframe().unwrap()).unwrap();

    let mean_age = once.column(clinical::MEAN_AGE).unwrap().f64().unwrap().clone();
    assert_eq!(mean_age.get(1), Some(47.25));
    assert_eq!(ints(&once, clinical::WEEK), vec![10, 11]);
    assert!(once.column("unnamed_0").is_err());

    let again = RawTable::from_dataframe(&once).unwrap().to_dataframe().unwrap();
    let twice = DataProcessor::normalize_clinical(&again).unwrap();
    assert!(once.equals_missing(&twice));
}

#[test]
fn nowcast_is_idempotent() {
    let content = "\
Datum;Schätzer_Neuerkrankungen;UG_PI_Neuerkrankungen;OG_PI_Neuerkrankungen;Schätzer_Reproduktionszahl_R;UG_PI_Reproduktionszahl_R;OG_PI_Reproduktionszahl_R
01.03.2020;120;100;140;2,5;2,1;2,9
02.03.2020;150;125;175;2,25;1,75;2,75
;;;;;;
Erläuterung: Schätzung;;;;;;
";
    let (_dir, raw) = load(SourceId::Nowcasting, content);
    let df = raw.to_dataframe().unwrap();
    // Only the first two rows are estimates.
    let options = NormalizeOptions {
        nowcasting_max_rows: Some(2),
        ..NormalizeOptions::default()
    };
    let once = DataProcessor::normalize_nowcasting(&df, &options).unwrap();
    assert_eq!(once.height(), 2);
    let r = once.column(nowcast::EST_R).unwrap().f64().unwrap().clone();
    assert_eq!(r.get(1), Some(2.25));

    let again = RawTable::from_dataframe(&once).unwrap().to_dataframe().unwrap();
    let twice = DataProcessor::normalize_nowcasting(&again, &NormalizeOptions::default()).unwrap();
    assert!(once.equals_missing(&twice));
}

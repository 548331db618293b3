use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use folder_ingest::ingestion::CsvParser;
use folder_ingest::record::{Record, to_data_set};
use folder_ingest::types::{DataType, Field, Schema, Value};

#[derive(Debug, Default)]
struct Reading {
    sensor_id: i64,
    label: Option<String>,
    value: f64,
    ok: bool,
    taken_at: chrono::NaiveDateTime,
}

impl Record for Reading {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("SensorId", DataType::Int64),
            Field::new("Label", DataType::Utf8).nullable(),
            Field::new("Value", DataType::Float64),
            Field::new("Ok", DataType::Bool),
            Field::new("TakenAt", DataType::DateTime),
        ])
    }

    fn set_field(&mut self, name: &str, value: Value) {
        match name {
            "SensorId" => value.assign_to(&mut self.sensor_id),
            "Label" => value.assign_to(&mut self.label),
            "Value" => value.assign_to(&mut self.value),
            "Ok" => value.assign_to(&mut self.ok),
            "TakenAt" => value.assign_to(&mut self.taken_at),
            _ => {}
        }
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.sensor_id.into(),
            self.label.clone().into(),
            self.value.into(),
            self.ok.into(),
            self.taken_at.into(),
        ]
    }
}

fn input(rows: usize) -> String {
    let mut s = String::from("sensor_id,label,value,ok,taken_at,unused\n");
    for i in 0..rows {
        let label = if i % 7 == 0 { "" } else { "probe" };
        s.push_str(&format!(
            "{i},{label},{}.25,{},2024-05-01 12:{:02}:00,x\n",
            i % 1000,
            i % 2,
            i % 60
        ));
    }
    s
}

fn bench_parse(c: &mut Criterion) {
    let parser = CsvParser::default();
    let mut group = c.benchmark_group("parse_reader");
    for rows in [1_000usize, 10_000] {
        let data = input(rows);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &data, |b, data| {
            b.iter(|| {
                let out: Vec<Reading> = parser
                    .parse_reader(black_box(data.as_bytes()), "bench.csv")
                    .unwrap();
                out
            })
        });
    }
    group.finish();
}

fn bench_to_data_set(c: &mut Criterion) {
    let records: Vec<Reading> = CsvParser::default()
        .parse_reader(input(10_000).as_bytes(), "bench.csv")
        .unwrap();
    c.bench_function("to_data_set_10000", |b| b.iter(|| to_data_set(black_box(&records))));
}

criterion_group!(benches, bench_parse, bench_to_data_set);
criterion_main!(benches);

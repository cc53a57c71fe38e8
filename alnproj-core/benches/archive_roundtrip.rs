use std::io::Cursor;

use alnproj_core::model::{Alignment, Sequence, SequenceFeature, View, Workspace};
use alnproj_core::{
    read_archive, write_views, ArchiveSink, ArchiveSource, HeadlessHost, LoadOptions, LoadSession, SaveSession,
    WriteOptions,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn generate_residues(length: usize, offset: usize) -> String {
    let pattern = b"ACGT";
    (0..length).map(|i| pattern[(i + offset) % pattern.len()] as char).collect()
}

fn generate_workspace(views: usize, rows: usize, length: usize) -> Workspace {
    let mut ws = Workspace::new();
    for v in 0..views {
        let sequences: Vec<_> = (0..rows)
            .map(|r| {
                let mut seq = Sequence::new(&format!("seq{}_{}", v, r), &generate_residues(length, r));
                seq.features.push(SequenceFeature::new("Domain", "repeat", 1, (length / 2) as i32));
                ws.add_sequence(seq)
            })
            .collect();
        let dataset = ws.create_dataset(&sequences);
        let view = View::new(
            &format!("view{}.fa", v),
            &format!("set{}", v),
            Alignment::new(sequences).with_dataset(dataset),
        );
        ws.add_view(view);
    }
    ws
}

fn save_to_bytes(ws: &Workspace) -> Vec<u8> {
    let mut host = HeadlessHost::new();
    let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
    let mut session = SaveSession::new(WriteOptions::default());
    let views = ws.view_order().to_vec();
    write_views(ws, &mut host, &views, &mut sink, &mut session);
    match sink.finish() {
        Ok(cursor) => cursor.into_inner(),
        Err(e) => panic!("failed to finish archive: {}", e),
    }
}

fn bench_save(c: &mut Criterion) {
    let ws = generate_workspace(4, 50, 1000);

    c.bench_function("save_4x50x1kb", |b| {
        b.iter(|| black_box(save_to_bytes(black_box(&ws))))
    });
}

fn bench_load(c: &mut Criterion) {
    let bytes = save_to_bytes(&generate_workspace(4, 50, 1000));

    c.bench_function("load_4x50x1kb", |b| {
        b.iter(|| {
            let mut ws = Workspace::new();
            let mut host = HeadlessHost::new();
            let mut source = match ArchiveSource::new(Cursor::new(black_box(bytes.clone()))) {
                Ok(source) => source,
                Err(e) => panic!("failed to open archive: {}", e),
            };
            let mut session = LoadSession::new(LoadOptions::default());
            let report = read_archive(&mut source, &mut ws, &mut host, &mut session);
            black_box(report.map(|r| r.views.len()).ok())
        })
    });
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);

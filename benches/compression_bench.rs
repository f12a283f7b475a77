use criterion::{black_box, criterion_group, criterion_main, Criterion};
use snaptar::{ArchiveOptions, Builder, Compression, Manifest};
use tempfile::tempdir;

fn bench_codecs(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];

    for compression in [Compression::gzip(), Compression::zstd()] {
        let name = format!("{}_encode_1mb", compression.codec.name());
        c.bench_function(&name, |b| {
            b.iter(|| compression.encode(&mut black_box(&data[..]), Vec::new()).unwrap())
        });
    }
}

fn bench_write_blob(c: &mut Criterion) {
    let data = vec![42u8; 1024 * 1024];
    let dir = tempdir().unwrap();

    for compression in [Compression::none(), Compression::gzip(), Compression::zstd()] {
        let name = format!("write_blob_1mb_{}", compression.codec.name());
        let path = dir.path().join(format!("{}.tar", compression.codec.name()));
        c.bench_function(&name, |b| {
            b.iter(|| {
                let opts = ArchiveOptions::write(&path).with_compression(compression);
                let mut archive = Builder::open(opts).unwrap();
                archive.writer().unwrap().write_blob(black_box(&data)).unwrap();
                archive.close().unwrap();
            })
        });
    }
}

fn bench_indexed_read(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("read.tar");
    let mut blobs = Vec::new();
    {
        let mut archive = Builder::open(ArchiveOptions::write(&path).with_prefix("bench")).unwrap();
        let w = archive.writer().unwrap();
        for i in 0..32u8 {
            blobs.push(w.write_blob(&vec![i; 64 * 1024]).unwrap());
        }
        w.write_config_file("manifest.json", &Vec::<Manifest>::new()).unwrap();
        archive.close().unwrap();
    }

    c.bench_function("manifest_scan_32_blobs", |b| {
        b.iter(|| {
            let mut archive = Builder::open(ArchiveOptions::read(&path)).unwrap();
            archive.reader().unwrap().manifest().unwrap();
        })
    });

    let mut archive = Builder::open(ArchiveOptions::read(&path)).unwrap();
    let reader = archive.reader().unwrap();
    reader.manifest().unwrap();
    c.bench_function("read_blob_content_64kb", |b| {
        b.iter(|| reader.read_blobs_content(black_box(&blobs[17])).unwrap())
    });
}

criterion_group!(benches, bench_codecs, bench_write_blob, bench_indexed_read);
criterion_main!(benches);

//! End-to-end pipeline tests over real input files and an on-disk store.

use approx::assert_relative_eq;
use redpipe_lib::filters::{
    ComprehensiveFilter, DnaRnaFilter, KnownSnpFilter, QualityDepthFilter, RepeatFilter,
    RepeatFilterConfig, SpliceJunctionFilter,
};
use redpipe_lib::model::{AnnotatedSite, VariantRecord};
use redpipe_lib::parsers::import_editing_database;
use redpipe_lib::pipeline::PipelineOrchestrator;
use redpipe_lib::stats::significance::{SignificanceConfig, SignificanceEngine};
use redpipe_lib::stats::FisherBackend;
use redpipe_lib::store::schema::{variant_schema, IndexSpec};
use redpipe_lib::store::CandidateStore;
use std::io::Write;
use std::path::Path;

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture { dir };
        fixture.write(
            "rna.vcf",
            "##fileformat=VCFv4.1\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE\n\
             chr1\t100\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t200\t.\tA\tG\t15\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t300\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t400\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t500\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:80,10:90\n\
             chr1\t600\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t800\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t900\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n\
             chr1\t1100\t.\tA\tG\t25\tPASS\t.\tGT:AD:DP\t0/1:2,8:10\n",
        );
        fixture.write(
            "dna.vcf",
            "##fileformat=VCFv4.1\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE\n\
             chr1\t600\t.\tA\t.\t60\tPASS\t.\tGT:AD\t0/0:30,0\n\
             chr1\t900\t.\tA\tG\t60\tPASS\t.\tGT:AD\t1/1:0,30\n",
        );
        fixture.write(
            "repeats.txt",
            "chr1\t290\t310\tLINE\n\
             chr1\t390\t410\tSINE/Alu\n",
        );
        // One transcript row for the gene window, one CDS row whose edges
        // drive the splice filter.
        fixture.write(
            "genes.txt",
            "chr1\t50\t1000\t60\t990\tmRNA\n\
             chr1\t50\t1000\t800\t990\tCDS\n",
        );
        fixture.write("snps.txt", "chr1\t100\n");
        fixture.write(
            "darned.txt",
            "chrom\tcoordinate\tinchr\tstrand\n\
             1\t500\tA\t+\n",
        );
        fixture
    }

    fn write(&self, name: &str, content: &str) {
        let mut file = std::fs::File::create(self.dir.path().join(name)).unwrap();
        write!(file, "{}", content).unwrap();
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

fn load_calls(store: &mut CandidateStore, path: &Path, table: &str) {
    store
        .recreate_table(table, &variant_schema(), Some(&IndexSpec::chrom_pos()))
        .unwrap();
    let reader = redpipe_lib::parsers::VariantReader::open(path).unwrap();
    store.bulk_load(table, reader, |_| true).unwrap();
}

fn orchestrator(fixture: &Fixture, paired: bool) -> PipelineOrchestrator<FisherBackend> {
    let engine = SignificanceEngine::new(FisherBackend, SignificanceConfig::default(), "sites");
    let mut orchestrator = PipelineOrchestrator::new(engine, "known_editing");
    orchestrator.add_stage(Box::new(QualityDepthFilter::new(20.0, 6, "stage_quality")));
    orchestrator.add_stage(Box::new(RepeatFilter::new(
        fixture.path("repeats.txt"),
        RepeatFilterConfig::default(),
        "stage_repeat",
    )));
    orchestrator.add_stage(Box::new(ComprehensiveFilter::new(
        fixture.path("genes.txt"),
        2,
        "stage_comprehensive",
    )));
    orchestrator.add_stage(Box::new(SpliceJunctionFilter::new(
        fixture.path("genes.txt"),
        2,
        "stage_splice",
    )));
    orchestrator.add_stage(Box::new(KnownSnpFilter::new(
        fixture.path("snps.txt"),
        "stage_snp",
    )));
    if paired {
        orchestrator.add_stage(Box::new(DnaRnaFilter::new("dna_calls", "stage_dnarna")));
    }
    orchestrator
}

fn seeded_store(fixture: &Fixture, db: &Path, paired: bool) -> CandidateStore {
    let mut store = CandidateStore::open(db).unwrap();
    load_calls(&mut store, &fixture.path("rna.vcf"), "rna_calls");
    if paired {
        load_calls(&mut store, &fixture.path("dna.vcf"), "dna_calls");
    }
    import_editing_database(
        &mut store,
        &fixture.path("darned.txt"),
        "darned",
        "known_editing",
    )
    .unwrap();
    store
}

#[test]
fn paired_run_narrows_to_the_edited_sites() {
    let fixture = Fixture::new();
    let db = fixture.path("run.sqlite");
    let mut store = seeded_store(&fixture, &db, true);

    let summary = orchestrator(&fixture, true)
        .run(&mut store, "rna_calls")
        .unwrap();

    // Narrowing is monotonic across the whole chain: each stage's output
    // is no larger than its input, and feeds the next stage.
    let mut previous: Option<u64> = None;
    for report in &summary.stage_reports {
        assert!(report.output_rows <= report.input_rows);
        if let Some(prev_out) = previous {
            assert_eq!(report.input_rows, prev_out);
        }
        previous = Some(report.output_rows);
    }

    // quality drops 200; repeat drops 300; comprehensive drops 1100;
    // splice drops 800; SNP drops 100; DNA/RNA drops 900.
    assert_eq!(store.row_count("stage_quality").unwrap(), 8);
    assert_eq!(store.row_count("stage_repeat").unwrap(), 7);
    assert_eq!(store.row_count("stage_comprehensive").unwrap(), 6);
    assert_eq!(store.row_count("stage_splice").unwrap(), 5);
    assert_eq!(store.row_count("stage_snp").unwrap(), 4);
    assert_eq!(store.row_count("stage_dnarna").unwrap(), 3);

    // The Alu-retained site is recorded to the side table.
    let alu: Vec<VariantRecord> = store.scan("stage_repeat_alu").unwrap();
    assert_eq!(alu.len(), 1);
    assert_eq!(alu[0].pos, 400);

    // Background over {400, 500, 600}: known 500 contributes 80/10, the
    // two novel sites contribute their depth as reference mass, so the
    // rounded background is ref=33, alt=3 and each novel site is Fisher
    // [[2,8],[33,3]].
    let significance = summary.significance.unwrap();
    assert_eq!(significance.background_ref, 33);
    assert_eq!(significance.background_alt, 3);
    assert_eq!(significance.surviving_rows, 2);
    assert_eq!(significance.significant_rows, 2);

    let mut sites: Vec<AnnotatedSite> = store.scan("sites").unwrap();
    sites.sort_by_key(|s| s.variant.pos);
    assert_eq!(sites.len(), 2);
    for (site, pos) in sites.iter().zip([400u64, 600]) {
        assert_eq!(site.variant.pos, pos);
        assert_relative_eq!(site.pvalue, 2.4558977924e-5, epsilon = 1e-6);
        assert_relative_eq!(site.level, 0.8, epsilon = 1e-12);
        let fdr = site.fdr.unwrap();
        assert!(fdr >= site.pvalue && fdr < 0.05);
    }
}

#[test]
fn interrupted_run_resumes_from_completed_stages() {
    let fixture = Fixture::new();
    let db = fixture.path("resume.sqlite");
    let mut store = seeded_store(&fixture, &db, false);
    orchestrator(&fixture, false)
        .run(&mut store, "rna_calls")
        .unwrap();
    drop(store);

    // A fresh orchestrator over the same store skips every stage.
    let mut store = CandidateStore::open(&db).unwrap();
    let summary = orchestrator(&fixture, false)
        .run(&mut store, "rna_calls")
        .unwrap();
    assert!(summary.stage_reports.is_empty());
    assert_eq!(summary.skipped_stages.len(), 6);
    assert!(summary.significance.is_none());
}

#[test]
fn changed_thresholds_invalidate_completed_stages() {
    let fixture = Fixture::new();
    let db = fixture.path("invalidate.sqlite");
    let mut store = seeded_store(&fixture, &db, false);
    orchestrator(&fixture, false)
        .run(&mut store, "rna_calls")
        .unwrap();

    // Tighter quality threshold: the quality stage must re-run, and so
    // must everything downstream of its rewritten output.
    let engine = SignificanceEngine::new(FisherBackend, SignificanceConfig::default(), "sites");
    let mut second = PipelineOrchestrator::new(engine, "known_editing");
    second.add_stage(Box::new(QualityDepthFilter::new(30.0, 6, "stage_quality")));
    let result = second.run(&mut store, "rna_calls");

    // All calls have qual 25 except none >= 30, so the candidate set dries
    // up and significance reports insufficient data.
    assert!(result.is_err());
    assert_eq!(store.row_count("stage_quality").unwrap(), 0);
}

#[test]
fn unpaired_run_keeps_dna_variant_positions() {
    let fixture = Fixture::new();
    let db = fixture.path("unpaired.sqlite");
    let mut store = seeded_store(&fixture, &db, false);
    orchestrator(&fixture, false)
        .run(&mut store, "rna_calls")
        .unwrap();
    // Without the DNA cross-check, position 900 survives the chain.
    let positions: Vec<u64> = store
        .scan::<VariantRecord>("stage_snp")
        .unwrap()
        .into_iter()
        .map(|r| r.pos)
        .collect();
    assert!(positions.contains(&900));
}

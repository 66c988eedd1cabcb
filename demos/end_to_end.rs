//! Complete end-to-end example: parses → labeled tree → query model
//!
//! This example runs the full analysis:
//! 1. Read a bracketed constituency parse and a CoNLL-U dependency parse
//! 2. Label and rewrite the constituency tree
//! 3. Extract dependencies and build the query model
//!
//! Run with: cargo run --example end_to_end

use geoquestion::{Analyzer, CoNLLUReader, Config, Entities, ParsedQuestion};

fn main() {
    println!("=== Geoquestion: End-to-End Example ===\n");

    let constituency = "(SBARQ (WHNP (WDT Which) (NNS rivers)) (SQ (VP (VBP flow) \
        (PP (IN into) (NP (DT the) (NNP Black) (NNP Sea))))) (. ?))";
    let conllu_text = "# sent_id = example-001
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

    // Step 1: Read the parses
    println!("🔧 Step 1: Reading parses...");
    let dependency = match CoNLLUReader::from_str(conllu_text).next() {
        Some(Ok(sentence)) => sentence,
        Some(Err(e)) => {
            eprintln!("❌ Parse error: {}", e);
            return;
        }
        None => {
            eprintln!("❌ No sentences found");
            return;
        }
    };
    println!("   Text: {}", dependency.text);

    let entities = Entities {
        toponyms: vec!["Black Sea".to_string()],
        ..Entities::default()
    };
    let question = match ParsedQuestion::from_bracketed(constituency, entities) {
        Ok(question) => question.with_dependency(dependency),
        Err(e) => {
            eprintln!("❌ Parse error: {}", e);
            return;
        }
    };
    println!();

    // Step 2: Analyze
    println!("🌳 Step 2: Labeling...");
    let analyzer = match Analyzer::from_config(Config::default()) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("❌ {}", e);
            return;
        }
    };
    let analysis = match analyzer.analyze(&question) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("❌ Analysis failed: {}", e);
            return;
        }
    };
    print!("{}", analysis.tree);
    println!("   Role code: {}", analysis.role_code);
    for issue in &analysis.issues {
        println!("   ⚠️  {}", issue);
    }
    println!();

    // Step 3: Dependencies and query model
    println!("🔍 Step 3: Dependencies...");
    for dependency in &analysis.dependencies {
        let names: Vec<&str> = dependency.arguments().collect();
        println!("   {:?} {}", dependency.kind, names.join(", "));
    }
    if let Some(query) = &analysis.query {
        println!("\n   Intent: {:?}", query.intent_names);
        for (name, variable) in query.variables.iter() {
            println!("   {} = {}", variable, name);
        }
    }

    println!("\n✅ Done");
}

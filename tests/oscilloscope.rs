use assert_matches::assert_matches;

use tekvxi::analysis;
use tekvxi::config::SessionConfig;
use tekvxi::devices::tds::{MeasurementState, Tds, PREAMBLE_QUERY};
use tekvxi::tokens::{ChannelId, MeasurementMode};
use tekvxi::transport::ScriptedTransport;
use tekvxi::Error;

fn tds1002b(source:&str, typ:&str) -> ScriptedTransport {
	let mut t = ScriptedTransport::new();
	t.reply("*IDN?", "TEKTRONIX,TDS 1002B,C012345,CF:91.1CT FV:v22.11\n")
		.reply("MEASU:IMM:SOU?", source)
		.reply("MEASU:IMM:TYP?", typ)
		.reply("MEASU:IMM:VAL?", "1.0E3\n")
		.reply("MEASU:IMM:UNI?", "\"Hz\"\n");
	t
}

fn connect(t:ScriptedTransport) -> Tds<ScriptedTransport> {
	let mut osci = Tds::connect(t, SessionConfig::default()).unwrap();
	osci.transport_mut().clear_log();
	osci
}

#[test]
fn connect_sets_up_transfers_and_reads_register() {
	let osci = Tds::connect(tds1002b("CH1\n", "FREQ\n"), SessionConfig::default()).unwrap();

	assert_eq!(osci.identity().model, "TDS 1002B");
	assert_eq!(osci.transport().writes(), vec!["DAT:ENC RPB", "DAT:WID 1"]);
	assert_eq!(osci.measurement_state(), Some(MeasurementState{ source: ChannelId::Analog(1), mode: MeasurementMode::Frequency }));
}

#[test]
fn rejects_other_instruments() {
	let mut t = ScriptedTransport::new();
	t.reply("*IDN?", "TEKTRONIX,AFG3022B,C036493,SCPI:99.0 FV:3.1.1\n");
	assert_matches!(Tds::connect(t, SessionConfig::default()).err(), Some(Error::WrongModel{..}));
}

#[test]
fn matching_register_is_not_rewritten() {
	let mut osci = connect(tds1002b("CH1\n", "FREQ\n"));

	let res = osci.measure("freq", &[1]).unwrap();
	assert!(osci.transport().writes().is_empty());
	assert_eq!(osci.transport().queries(), vec!["MEASU:IMM:VAL?", "MEASU:IMM:UNI?"]);

	assert_eq!(res.len(), 1);
	assert_eq!(res[0].channel, ChannelId::Analog(1));
	assert_eq!(res[0].mode, MeasurementMode::Frequency);
	assert_eq!(res[0].value, 1000.0);
	assert_eq!(res[0].units, "Hz");
}

#[test]
fn shared_register_follows_the_channel() {
	let mut osci = connect(tds1002b("CH1\n", "FREQ\n"));

	osci.measure("min", &[1, 2]).unwrap();
	assert_eq!(osci.transport().writes(), vec!["MEASU:IMM:TYP MINI", "MEASU:IMM:SOU CH2"]);

	osci.transport_mut().clear_log();
	osci.measure("minimum", &["ch1"]).unwrap();
	assert_eq!(osci.transport().writes(), vec!["MEASU:IMM:SOU CH1"]);
	assert_eq!(osci.measurement_state(), Some(MeasurementState{ source: ChannelId::Analog(1), mode: MeasurementMode::Minimum }));
}

#[test]
fn math_source() {
	let mut osci = connect(tds1002b("CH1\n", "MEAN\n"));

	let res = osci.measure("mean", &["math"]).unwrap();
	assert_eq!(osci.transport().writes(), vec!["MEASU:IMM:SOU MATH"]);
	assert_eq!(res[0].channel, ChannelId::Math);
}

#[test]
fn unknown_register_contents_are_overwritten() {
	let mut osci = connect(tds1002b("REF1\n", "PWIDTH\n"));
	assert_eq!(osci.measurement_state(), None);

	osci.measure("pk2pk", &[2]).unwrap();
	assert_eq!(osci.transport().writes(), vec!["MEASU:IMM:SOU CH2", "MEASU:IMM:TYP PK2"]);
}

#[test]
fn bad_channel_sends_nothing() {
	let mut osci = connect(tds1002b("CH1\n", "FREQ\n"));

	assert_matches!(osci.measure("min", &["1", "ch3"]), Err(Error::OutOfRange{ channel: 3, count: 2 }));
	assert_matches!(osci.measure("min", &["x"]), Err(Error::InvalidChannel(_)));
	assert!(osci.transport().log().is_empty());
}

#[test]
fn failed_write_forces_resync() {
	let mut osci = connect(tds1002b("CH1\n", "FREQ\n"));

	osci.transport_mut().fail_next_write();
	assert_matches!(osci.measure("rms", &[1]), Err(Error::Communication(_)));
	assert_eq!(osci.measurement_state(), None);

	osci.measure("rms", &[1]).unwrap();
	assert_eq!(osci.transport().queries()[..2], ["MEASU:IMM:SOU?", "MEASU:IMM:TYP?"]);
	assert_eq!(osci.transport().writes(), vec!["MEASU:IMM:TYP RMS"]);
}

fn with_curves(curves:&[&[u8]]) -> ScriptedTransport {
	let mut t = tds1002b("CH1\n", "FREQ\n");
	t.reply(PREAMBLE_QUERY, "0.0E0;1.0E-3;0.0E0;1.0E-1;1.28E2\n");
	for c in curves {
		let mut block = format!("#1{}", c.len()).into_bytes();
		block.extend_from_slice(c);
		block.push(b'\n');
		t.reply_binary("CURV?", block);
	}
	t
}

#[test]
fn screen_transfer() {
	let mut osci = connect(with_curves(&[&[128, 138, 128, 118], &[128, 128, 128, 128]]));

	let screen = osci.screen(&[1, 2]).unwrap();
	assert_eq!(osci.transport().writes(), vec!["DAT:SOU CH1", "DAT:SOU CH2"]);
	assert_eq!(screen.points(), 4);

	let ch1 = screen.trace(ChannelId::Analog(1)).unwrap();
	assert_eq!(ch1.time.len(), 4);
	assert!((ch1.time[3] - 3.0e-3).abs() < 1e-12);
	assert!((ch1.voltage[1] - 1.0).abs() < 1e-12);
	assert!((ch1.sample_rate() - 1000.0).abs() < 1e-9);

	// One full cycle over four samples
	let peak = analysis::trace_peak(ch1).unwrap();
	assert!((peak.frequency - 250.0).abs() < 1e-9);
	assert!((peak.amplitude - 1.0).abs() < 1e-9);
}

#[test]
fn screen_length_mismatch() {
	let mut osci = connect(with_curves(&[&[1, 2, 3, 4], &[1, 2, 3]]));
	assert_matches!(osci.screen(&[1, 2]), Err(Error::InconsistentReadback(_)));
}

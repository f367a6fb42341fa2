use sotto_audio::AudioBuffer;

#[test]
fn new_buffer_is_empty() {
    let buffer = AudioBuffer::new();
    assert_eq!(buffer.chunk_count(), 0);
    assert!(buffer.is_empty());
    assert!(buffer.to_bytes().is_empty());
}

#[test]
fn append_keeps_insertion_order() {
    let mut buffer = AudioBuffer::new();
    buffer.append(vec![1, 2]);
    buffer.append(vec![3, 4]);
    buffer.append(vec![5, 6]);

    assert_eq!(buffer.chunk_count(), 3);
    assert_eq!(buffer.to_bytes(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn from_chunk_holds_one_chunk() {
    let buffer = AudioBuffer::from_chunk(vec![0, 0, 0, 0]);
    assert_eq!(buffer.chunk_count(), 1);
    assert_eq!(buffer.to_bytes().len(), 4);
}

#[test]
fn i16_view_decodes_little_endian_across_chunks() {
    let mut buffer = AudioBuffer::new();
    // 256 in the first chunk, -1 in the second
    buffer.append(vec![0x00, 0x01]);
    buffer.append(vec![0xFF, 0xFF]);

    assert_eq!(buffer.to_i16(), vec![256, -1]);
}

#[test]
fn f32_view_is_normalized() {
    let mut buffer = AudioBuffer::new();
    buffer.append(16384i16.to_le_bytes().to_vec());
    buffer.append((-16384i16).to_le_bytes().to_vec());

    assert_eq!(buffer.to_f32(), vec![0.5, -0.5]);
}

#[test]
fn take_resets_via_default() {
    let mut buffer = AudioBuffer::from_chunk(vec![1, 2]);
    let taken = std::mem::take(&mut buffer);

    assert_eq!(taken.chunk_count(), 1);
    assert!(buffer.is_empty());
}

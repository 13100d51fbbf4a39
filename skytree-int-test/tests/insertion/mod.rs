mod insertion_test;
